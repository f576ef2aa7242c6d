//! services/engine/src/bin/openapi.rs
//!
//! Writes the engine's OpenAPI 3.0 document to `openapi.json` so client
//! types can be regenerated without standing up a running server.

use engine_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = "openapi.json";
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(path, document)?;
    println!("OpenAPI specification generated at {}", path);
    Ok(())
}
