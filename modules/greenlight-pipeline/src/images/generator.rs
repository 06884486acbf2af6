//! Deterministic local image generation: a rendered SVG information card.
//! Last stage of the cascade; defined to never leave a slot unfilled.
//! Same topic and slot always render the same card.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use greenlight_common::{content_hash, AssignedImage, Provenance};

use crate::util::slugify;

/// Background/accent pairs; chosen by content hash so a topic keeps its
/// palette across runs.
const PALETTE: [(&str, &str); 4] = [
    ("#1f2a44", "#7fb4ff"),
    ("#243b2f", "#8fd6a8"),
    ("#3b2440", "#d8a2e0"),
    ("#40311f", "#e0c184"),
];

pub struct CardGenerator {
    out_dir: PathBuf,
}

impl CardGenerator {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
        }
    }

    pub fn generate(
        &self,
        topic: &str,
        entities: &BTreeMap<String, String>,
        slot: &str,
        alt_text: String,
    ) -> Result<AssignedImage> {
        let key = content_hash(&format!("{topic}|{slot}"));
        let palette_idx =
            usize::from(u8::from_str_radix(&key[..2], 16).unwrap_or(0)) % PALETTE.len();
        let (background, accent) = PALETTE[palette_idx];

        let mut lines = String::new();
        for (i, (name, value)) in entities.iter().take(4).enumerate() {
            lines.push_str(&format!(
                "  <text x=\"60\" y=\"{}\" fill=\"{accent}\" font-size=\"28\" \
font-family=\"sans-serif\">{}: {}</text>\n",
                220 + i * 48,
                escape(name),
                escape(value),
            ));
        }

        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"1200\" height=\"630\" \
viewBox=\"0 0 1200 630\">\n\
  <rect width=\"1200\" height=\"630\" fill=\"{background}\"/>\n\
  <rect x=\"40\" y=\"40\" width=\"1120\" height=\"550\" fill=\"none\" \
stroke=\"{accent}\" stroke-width=\"3\"/>\n\
  <text x=\"60\" y=\"140\" fill=\"#ffffff\" font-size=\"48\" \
font-family=\"sans-serif\">{}</text>\n\
{lines}</svg>\n",
            escape(topic),
        );

        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        let path = self
            .out_dir
            .join(format!("{}-{slot}.svg", slugify(topic)));
        std::fs::write(&path, &svg).with_context(|| format!("writing {}", path.display()))?;

        Ok(AssignedImage {
            url: path.display().to_string(),
            content_key: format!("generated:{key}"),
            provenance: Provenance::Generated,
            alt_text,
        })
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
