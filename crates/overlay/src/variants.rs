//! Built-in form variants
//!
//! Each variant is an independent JSON table embedded at compile time.

use crate::parser::load_variant;
use crate::{FormVariantSpec, Result, VariantId};

const LEGAL_ENTITY: &str = include_str!("../data/variants/legal-entity.json");
const LEGAL_ENTITY_EXTENDED: &str = include_str!("../data/variants/legal-entity-extended.json");
const NATURAL_PERSON: &str = include_str!("../data/variants/natural-person.json");
const SIMPLIFIED: &str = include_str!("../data/variants/simplified.json");

/// Raw JSON of a built-in variant
pub fn builtin_json(id: VariantId) -> &'static str {
    match id {
        VariantId::LegalEntity => LEGAL_ENTITY,
        VariantId::LegalEntityExtended => LEGAL_ENTITY_EXTENDED,
        VariantId::NaturalPerson => NATURAL_PERSON,
        VariantId::Simplified => SIMPLIFIED,
    }
}

/// Parsed and validated built-in variant
pub fn builtin(id: VariantId) -> Result<FormVariantSpec> {
    load_variant(builtin_json(id))
}
