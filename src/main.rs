#[tokio::main]
async fn main() {
    pairup::start_server().await;
}
