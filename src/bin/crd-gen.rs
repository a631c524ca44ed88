use canaryctl::crd::Canary;
use kube::CustomResourceExt;

fn main() {
    match serde_json::to_string_pretty(&Canary::crd()) {
        Ok(crd_yaml) => print!("{}", crd_yaml),
        Err(e) => {
            eprintln!("Error serializing CRD: {}", e);
            std::process::exit(1);
        }
    }
}
