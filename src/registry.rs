//! Process-wide struct metadata.
//!
//! The derive macros describe a struct as a flat list of [`FieldDesc`] records. The first
//! time a type is encoded or registered, that description is resolved into a
//! [`StructMeta`]: the class name, the wire alias of every included field and the class
//! definition block written in front of the first object of the type.
//!
//! Registration binds a class name to the metadata so that objects read into a
//! [`Value`](crate::Value) can be recognised. Encoding an unregistered struct resolves its
//! metadata under the type name without binding the name.

use crate::encoder::class_block;
use crate::{Decoder, Encoder, HproseError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Namespaces consulted before the ones given to [`register_with`].
const DEFAULT_TAGS: [&str; 2] = ["hprose", "json"];

/// Compile-time description of one field, produced by the derive macros.
#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    /// Rust field name.
    pub name: &'static str,
    pub type_name: &'static str,
    /// `(namespace, alias)` annotations, e.g. `("json", "user_id,omitempty")`.
    pub aliases: &'static [(&'static str, &'static str)],
}

/// A struct with a class name and an ordered, flattened field list.
///
/// Implemented by `#[derive(Encode)]`, `#[derive(Decode)]` or `#[derive(Struct)]`.
pub trait Struct: 'static {
    const NAME: &'static str;
    const FIELD_COUNT: usize;

    /// Appends `FIELD_COUNT` field descriptions, nested flattened structs included.
    fn describe(out: &mut Vec<FieldDesc>);
}

pub trait StructEncode: Struct {
    /// Encodes the field at `index` of the flattened field list.
    fn encode_field(&self, index: usize, enc: &mut Encoder);
}

pub trait StructDecode: Struct + Default {
    /// Decodes the field at `index` of the flattened field list. `tag` has already been read.
    fn decode_field(&mut self, index: usize, dec: &mut Decoder, tag: u8) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: &'static str,
    /// Name of the field on the wire.
    pub alias: String,
    /// Position in the flattened field list.
    pub index: usize,
    pub type_name: &'static str,
}

/// Resolved metadata of a struct type.
#[derive(Debug)]
pub struct StructMeta {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub fields: Vec<FieldMeta>,
    index: HashMap<String, usize>,
    header: Bytes,
}

impl StructMeta {
    fn build<T: Struct>(name: &str, tags: &[&str]) -> Result<Self> {
        let mut descs = Vec::with_capacity(T::FIELD_COUNT);
        T::describe(&mut descs);

        let mut fields = Vec::with_capacity(descs.len());
        let mut index = HashMap::with_capacity(descs.len());
        for (position, desc) in descs.iter().enumerate() {
            let alias = resolve_alias(desc, tags);
            if alias == "-" {
                continue;
            }
            if index.insert(alias.clone(), fields.len()).is_some() {
                return Err(HproseError::AmbiguousField {
                    class: name.to_string(),
                    alias,
                });
            }
            fields.push(FieldMeta {
                name: desc.name,
                alias,
                index: position,
                type_name: desc.type_name,
            });
        }
        let header = class_block(name, fields.iter().map(|f| f.alias.as_str())).freeze();
        Ok(StructMeta {
            name: name.to_string(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            fields,
            index,
            header,
        })
    }

    /// Field with the given wire name.
    pub fn field(&self, alias: &str) -> Option<&FieldMeta> {
        self.index.get(alias).map(|&i| &self.fields[i])
    }

    /// The class definition block, `c<len>"Name"<count>{...}`.
    pub fn header(&self) -> &[u8] {
        &self.header
    }
}

fn resolve_alias(desc: &FieldDesc, tags: &[&str]) -> String {
    for tag in DEFAULT_TAGS.iter().chain(tags) {
        let annotated = desc.aliases.iter().find(|(ns, _)| ns == tag);
        if let Some((_, value)) = annotated {
            let alias = value.split(',').next().unwrap_or_default().trim();
            if !alias.is_empty() {
                return alias.to_string();
            }
        }
    }
    lower_first(desc.name)
}

/// Lowercases an ASCII first letter; other names are kept as they are.
fn lower_first(name: &str) -> String {
    let mut name = name.to_string();
    if let Some(first) = name.get_mut(..1) {
        first.make_ascii_lowercase();
    }
    name
}

struct Registry {
    by_type: DashMap<TypeId, Arc<StructMeta>>,
    by_name: DashMap<String, Arc<StructMeta>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        by_type: DashMap::new(),
        by_name: DashMap::new(),
    })
}

/// Registers `T` under its own class name.
pub fn register<T: Struct>() -> Result<Arc<StructMeta>> {
    register_with::<T>(None, &[])
}

/// Registers `T` under the class name `alias`.
pub fn register_as<T: Struct>(alias: &str) -> Result<Arc<StructMeta>> {
    register_with::<T>(Some(alias), &[])
}

/// Registers `T`, resolving field aliases from the `tags` namespaces after the defaults.
///
/// Registering a type again replaces its previous metadata.
pub fn register_with<T: Struct>(alias: Option<&str>, tags: &[&str]) -> Result<Arc<StructMeta>> {
    let name = alias.unwrap_or(T::NAME);
    let meta = Arc::new(StructMeta::build::<T>(name, tags)?);
    let reg = registry();
    reg.by_type.insert(TypeId::of::<T>(), meta.clone());
    reg.by_name.insert(name.to_string(), meta.clone());
    debug!(
        class = name,
        fields = meta.fields.len(),
        type_name = meta.type_name,
        "registered struct"
    );
    Ok(meta)
}

/// Metadata registered under the class name `name`.
pub fn lookup(name: &str) -> Option<Arc<StructMeta>> {
    registry().by_name.get(name).map(|meta| meta.value().clone())
}

/// Metadata of `T`, resolved on first use.
pub fn meta_of<T: Struct>() -> Result<Arc<StructMeta>> {
    let id = TypeId::of::<T>();
    let reg = registry();
    let found = reg.by_type.get(&id).map(|meta| meta.value().clone());
    if let Some(meta) = found {
        return Ok(meta);
    }
    let meta = Arc::new(StructMeta::build::<T>(T::NAME, &[])?);
    Ok(reg.by_type.entry(id).or_insert(meta).value().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_first_only_touches_ascii() {
        assert_eq!(lower_first("Name"), "name");
        assert_eq!(lower_first("id"), "id");
        assert_eq!(lower_first("ÉTAT"), "ÉTAT");
        assert_eq!(lower_first("Ωmega"), "Ωmega");
        assert_eq!(lower_first(""), "");
    }
}
