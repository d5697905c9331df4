//! Print the relay's OpenAPI document as pretty JSON.

use utoipa::OpenApi;
use watchparty_sync::services::documentation::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
