use mindtimer::command::Error;


#[tokio::main]
async fn main() -> Result<(), Error> {
    mindtimer::command::run().await
}
