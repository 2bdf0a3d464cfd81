use std::fs;

use ab_glyph::FontArc;
use anyhow::{Context, Result, anyhow};
use fontdb::{Database, Family, Query, Source};
use tracing::debug;

/// Loads the overlay font from the system font database.
///
/// `preferred` is tried first, then a short list of common sans-serif faces,
/// then any face that decodes.
pub fn load_font(preferred: Option<&str>) -> Result<FontArc> {
    let mut db = Database::new();
    db.load_system_fonts();

    let mut families = Vec::new();
    if let Some(name) = preferred {
        families.push(Family::Name(name));
    }
    families.extend([
        Family::Name("DejaVu Sans"),
        Family::Name("Noto Sans"),
        Family::Name("Liberation Sans"),
        Family::SansSerif,
    ]);

    for family in &families {
        if let Some(id) = db.query(&Query {
            families: std::slice::from_ref(family),
            ..Default::default()
        }) && let Some(font) = load_face(&db, id)?
        {
            if let Some(face) = db.face(id) {
                debug!(font = %face.post_script_name, "overlay font selected");
            }
            return Ok(font);
        }
    }

    for face in db.faces() {
        if let Some(font) = load_face(&db, face.id)? {
            return Ok(font);
        }
    }

    Err(anyhow!("failed to load a system font for the overlay"))
}

fn load_face(db: &Database, id: fontdb::ID) -> Result<Option<FontArc>> {
    let face = db.face(id).context("missing font face in database")?;
    let data = match &face.source {
        Source::Binary(data) => data.as_ref().as_ref().to_vec(),
        Source::File(path) => fs::read(path)
            .with_context(|| format!("failed to read font at {}", path.display()))?,
        Source::SharedFile(_, data) => data.as_ref().as_ref().to_vec(),
    };
    // faces ab_glyph cannot parse are skipped
    Ok(FontArc::try_from_vec(data).ok())
}
