#[tokio::main]
async fn main() {
    if let Err(e) = execmirror_lib::run().await {
        tracing::error!("ExecMirror stopped: {e}");
        eprintln!("execmirror: {e}");
        std::process::exit(1);
    }
}
