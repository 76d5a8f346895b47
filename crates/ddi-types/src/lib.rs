//! Record variants and the registry that resolves raw records to them.

use std::collections::BTreeMap;

use ddi_core::issue;
use ddi_core::{Datum, ObjectParser, Pointer, Report};
use serde_json::Value;
use thiserror::Error;

macro_rules! datum_common {
    ($($field:ident).+) => {
        fn base(&self) -> &ddi_core::Base {
            &self.$($field).+
        }

        fn base_mut(&mut self) -> &mut ddi_core::Base {
            &mut self.$($field).+
        }

        fn to_document(&self) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(self)
        }

        fn clone_datum(&self) -> Box<dyn ddi_core::Datum> {
            Box::new(self.clone())
        }
    };
}

pub mod basal;
pub mod blood;
pub mod bolus;
pub mod device_event;
pub mod glucose;
pub mod insulin;
pub mod pump_settings;
pub mod upload;
pub mod wizard;

pub use upload::Upload;

pub const CRATE_NAME: &str = "ddi-types";

pub type DatumFactory = fn() -> Box<dyn Datum>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type {0:?} is already registered")]
    TypeRegistered(String),
    #[error("type {datum_type:?} with {field} {value:?} is already registered")]
    VariantRegistered {
        datum_type: String,
        field: String,
        value: String,
    },
    #[error("type {datum_type:?} is keyed by {existing}, not {field}")]
    DiscriminatorMismatch {
        datum_type: String,
        existing: String,
        field: String,
    },
}

#[derive(Debug)]
enum Entry {
    Single(DatumFactory),
    Keyed {
        field: &'static str,
        variants: BTreeMap<&'static str, DatumFactory>,
    },
}

/// Maps `type` (and, for keyed types, a secondary discriminator such as
/// `subType` or `deliveryType`) to a factory for the matching variant.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<&'static str, Entry>,
}

/// A resolved and parsed record with its position in the submitted batch.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub index: usize,
    pub datum: Box<dyn Datum>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every variant this crate ships.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register_standard()
            .expect("standard variants use distinct discriminators");
        registry
    }

    fn register_standard(&mut self) -> Result<(), RegistryError> {
        self.register(blood::CONTINUOUS_TYPE, blood::new_continuous)?;
        self.register(blood::SELF_MONITORED_TYPE, blood::new_self_monitored)?;
        self.register(blood::KETONE_TYPE, blood::new_ketone)?;
        self.register(insulin::TYPE, insulin::new)?;
        self.register(pump_settings::TYPE, pump_settings::new)?;
        self.register(wizard::TYPE, wizard::new)?;
        for (delivery_type, factory) in basal::VARIANTS {
            self.register_variant(basal::TYPE, basal::DELIVERY_TYPE_FIELD, *delivery_type, *factory)?;
        }
        for (sub_type, factory) in bolus::VARIANTS {
            self.register_variant(bolus::TYPE, bolus::SUB_TYPE_FIELD, *sub_type, *factory)?;
        }
        for (sub_type, factory) in device_event::VARIANTS {
            self.register_variant(device_event::TYPE, device_event::SUB_TYPE_FIELD, *sub_type, *factory)?;
        }
        Ok(())
    }

    pub fn register(&mut self, datum_type: &'static str, factory: DatumFactory) -> Result<(), RegistryError> {
        if self.entries.contains_key(datum_type) {
            return Err(RegistryError::TypeRegistered(datum_type.to_string()));
        }
        self.entries.insert(datum_type, Entry::Single(factory));
        Ok(())
    }

    pub fn register_variant(
        &mut self,
        datum_type: &'static str,
        field: &'static str,
        value: &'static str,
        factory: DatumFactory,
    ) -> Result<(), RegistryError> {
        let entry = self.entries.entry(datum_type).or_insert_with(|| Entry::Keyed {
            field,
            variants: BTreeMap::new(),
        });
        match entry {
            Entry::Single(_) => Err(RegistryError::TypeRegistered(datum_type.to_string())),
            Entry::Keyed { field: existing, .. } if *existing != field => Err(RegistryError::DiscriminatorMismatch {
                datum_type: datum_type.to_string(),
                existing: existing.to_string(),
                field: field.to_string(),
            }),
            Entry::Keyed { variants, .. } => {
                if variants.contains_key(value) {
                    return Err(RegistryError::VariantRegistered {
                        datum_type: datum_type.to_string(),
                        field: field.to_string(),
                        value: value.to_string(),
                    });
                }
                variants.insert(value, factory);
                Ok(())
            }
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().copied()
    }

    /// Reads the discriminators and builds an empty variant. Reports and
    /// returns `None` when either discriminator is absent or unknown.
    pub fn resolve(&self, parser: &mut ObjectParser<'_>) -> Option<Box<dyn Datum>> {
        let datum_type = required_discriminator(parser, "type")?;
        let Some(entry) = self.entries.get(datum_type.as_str()) else {
            parser.append_issue("type", issue::type_invalid(&datum_type));
            return None;
        };
        match entry {
            Entry::Single(factory) => Some(factory()),
            Entry::Keyed { field, variants } => {
                let value = required_discriminator(parser, field)?;
                match variants.get(value.as_str()) {
                    Some(factory) => Some(factory()),
                    None => {
                        parser.append_issue(field, issue::sub_type_invalid(field, &value));
                        None
                    }
                }
            }
        }
    }

    pub fn parse_datum(&self, parser: &mut ObjectParser<'_>) -> Option<Box<dyn Datum>> {
        let mut datum = self.resolve(parser)?;
        datum.parse(parser);
        Some(datum)
    }

    /// Parses a submitted batch. Bad elements are reported and skipped; the
    /// batch itself never aborts.
    pub fn parse_array(&self, array: &[Value], report: &mut Report) -> Vec<Parsed> {
        let mut out = Vec::with_capacity(array.len());
        for (index, value) in array.iter().enumerate() {
            let pointer = Pointer::root().child(index);
            let Some(object) = value.as_object() else {
                report.append(&pointer, issue::value_not_type("object", value));
                continue;
            };
            let mut parser = ObjectParser::new(object, pointer, report);
            if let Some(datum) = self.parse_datum(&mut parser) {
                parser.finish();
                out.push(Parsed { index, datum });
            }
        }
        out
    }
}

fn required_discriminator(parser: &mut ObjectParser<'_>, field: &str) -> Option<String> {
    let present = parser.peek(field).is_some();
    let value = parser.string(field);
    if !present {
        parser.append_issue(field, issue::value_not_exists());
    }
    value
}
