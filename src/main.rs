#[tokio::main]
async fn main() -> anyhow::Result<()> {
    interval_timer_lib::run().await
}
