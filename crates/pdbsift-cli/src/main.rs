//! Binary entrypoint for `pdbsift`.

#[tokio::main]
async fn main() {
    let code = pdbsift_cli::run().await;
    std::process::exit(code);
}
