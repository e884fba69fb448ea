use anyhow::Result;
use terraform_provider_plural::PluralProvider;
use tf_provider::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve("plural", PluralProvider::default()).await
}
