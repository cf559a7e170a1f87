//! Binary entrypoint for the rpcgate administrative CLI.

#[tokio::main]
async fn main() {
    let exit_code = rpcgate_cli::run().await;
    std::process::exit(exit_code);
}
