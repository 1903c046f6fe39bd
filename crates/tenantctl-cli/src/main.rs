use std::process;

#[tokio::main]
async fn main() {
    let code = tenantctl_cli::run().await;
    process::exit(code);
}
