#[tokio::main]
async fn main() {
    if let Err(e) = postscraper_lib::app::run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
