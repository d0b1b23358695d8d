#[tokio::main]
async fn main() {
    if let Err(error) = avatar_lifecycle::run(std::env::args().nth(1)).await {
        eprintln!("avatar-lifecycle: {}", error);
        std::process::exit(1);
    }
}
