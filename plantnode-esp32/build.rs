fn main() {
    embuild::espidf::sysenv::output();

    // PLANTNODE_* settings from .env become compile-time environment
    println!("cargo:rerun-if-changed=.env");
    if let Ok(vars) = dotenvy::dotenv_iter() {
        for (key, value) in vars.flatten() {
            if key.starts_with("PLANTNODE_") {
                println!("cargo:rustc-env={key}={value}");
            }
        }
    }

    println!("cargo:rerun-if-changed=sdkconfig.defaults");
}
