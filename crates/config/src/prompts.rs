//! System prompt for the sales persona

use serde::{Deserialize, Serialize};

/// Max chars of the product description placed in the prompt
const DESCRIPTION_MAX_CHARS: usize = 100;
/// Max chars of the pitch placed in the prompt
const PITCH_MAX_CHARS: usize = 80;

/// Product pitched on the calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    #[serde(default = "default_product_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub pitch: String,
}

fn default_product_name() -> String {
    "naše služby".to_string()
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            name: default_product_name(),
            description: "Moderní weby pro malé firmy".to_string(),
            pitch: "Nový web za týden, bez starostí".to_string(),
        }
    }
}

pub const SALES_TEMPLATE: &str = "Jsi Pavel - obchodní zástupce z MoravskéWeby. Voláš ohledně webů.

PRODUKT: {product_name}

POPIS: {product_description}

NABÍZÍŠ: {product_pitch}

JAK MLUVIT:
- KRÁTCE! Max 1-2 věty!
- Přirozeně a přátelsky
- Reaguj na to, co říkají
- Bez frází, jako když voláš kamarádovi

ČESKÝ TÓN:
- \"Jo\" místo \"Ano\"
- \"Víte\" s úsměvem v hlase
- \"Super\" místo \"Výborně\"

PRAVIDLA:
1. Poslouchej víc, než mluvíš
2. Reaguj na konkrétní věci, co řekli
3. Bez opakování
4. Když \"ne\" -> \"Ok, dík. Hezký den.\" (KONEC)
5. Když \"ano\" -> \"Super! Zavolá vám Pavel s detaily\"

NEMĚJ:
- Dlouhé řeči
- Technické detaily
- Formality

TÓN: Přátelský, energický, normální chlap, ne robot";

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Fill [`SALES_TEMPLATE`] for a product
pub fn render_sales_prompt(product: &ProductConfig) -> String {
    SALES_TEMPLATE
        .replace("{product_name}", &product.name)
        .replace(
            "{product_description}",
            clip(&product.description, DESCRIPTION_MAX_CHARS),
        )
        .replace("{product_pitch}", clip(&product.pitch, PITCH_MAX_CHARS))
}
