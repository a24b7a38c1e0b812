extern crate proc_macro;

use itertools::izip;
use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use std::collections::HashMap;
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DeriveInput, Fields, Generics, Ident, LitStr,
    Type,
};

/// Struct attributes parsed from `#[hprose(...)]` annotations
///
/// * `name` - Class name written on the wire (defaults to the type name)
/// * `as_map` - Encode as a map from field aliases to values instead of an object
#[derive(Debug, Default)]
struct StructAttributes {
    name: Option<String>,
    as_map: bool,
}

/// Field attributes parsed from `#[hprose(...)]` annotations
///
/// * `aliases` - `(namespace, alias)` pairs; `rename = "x"` is the `hprose` namespace
/// * `skip` - The field is neither written nor read
/// * `flatten` - The fields of the nested struct are inlined into this one
#[derive(Debug, Default)]
struct FieldAttributes {
    aliases: Vec<(String, String)>,
    skip: bool,
    flatten: bool,
}

/// A named field that takes part in encoding.
struct FieldInfo<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    attrs: FieldAttributes,
}

/// Strips the raw identifier prefix, `r#type` is the field `type` on the wire.
fn unraw(ident: &Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}

fn get_struct_attributes(attrs: &[Attribute]) -> syn::Result<StructAttributes> {
    let mut parsed = StructAttributes::default();
    for attr in attrs {
        if !attr.path().is_ident("hprose") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.name = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("as_map") {
                parsed.as_map = true;
                Ok(())
            } else {
                Err(meta.error("unknown hprose struct attribute"))
            }
        })?;
    }
    Ok(parsed)
}

/// Extract and parse `#[hprose(...)]` attribute values from field attributes
///
/// # Supported Attributes
///
/// * `#[hprose(rename = "name")]` - Wire name of the field
/// * `#[hprose(alias(json = "a", xml = "b"))]` - Per-namespace wire names
/// * `#[hprose(skip)]` - Neither written nor read; keeps its `Default` on decode
/// * `#[hprose(flatten)]` - Inline the fields of a nested struct
///
/// Multiple attributes can be combined: `#[hprose(rename = "id", alias(json = "ID"))]`
fn get_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut parsed = FieldAttributes::default();
    for attr in attrs {
        if !attr.path().is_ident("hprose") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.aliases.push(("hprose".to_string(), lit.value()));
                Ok(())
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
                Ok(())
            } else if meta.path.is_ident("flatten") {
                parsed.flatten = true;
                Ok(())
            } else if meta.path.is_ident("alias") {
                meta.parse_nested_meta(|alias| {
                    let namespace = alias
                        .path
                        .get_ident()
                        .map(unraw)
                        .ok_or_else(|| alias.error("alias namespace must be an identifier"))?;
                    let lit: LitStr = alias.value()?.parse()?;
                    parsed.aliases.push((namespace, lit.value()));
                    Ok(())
                })
            } else {
                Err(meta.error("unknown hprose field attribute"))
            }
        })?;
    }
    Ok(parsed)
}

/// Panics when two fields carry the same literal alias in one namespace.
fn check_duplicate_aliases(name: &Ident, fields: &[FieldInfo]) {
    let mut seen: HashMap<(&str, &str), &Ident> = HashMap::new();
    for field in fields {
        for (namespace, alias) in &field.attrs.aliases {
            let alias = alias.split(',').next().unwrap_or_default().trim();
            if alias.is_empty() || alias == "-" {
                continue;
            }
            if let Some(previous) = seen.insert((namespace.as_str(), alias), field.ident) {
                panic!(
                    "Alias {:?} in namespace {:?} is duplicated for struct '{}' (fields '{}' and '{}').",
                    alias, namespace, name, previous, field.ident
                );
            }
        }
    }
}

fn add_bounds(generics: &Generics, bound: TokenStream2) -> Generics {
    let mut generics = generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(#bound));
    }
    generics
}

/// How a struct is shaped for the derives.
enum Shape<'a> {
    /// Named fields (or a unit struct, with none): an object.
    Object(Vec<FieldInfo<'a>>),
    /// Tuple struct: a list.
    Tuple(Vec<&'a Type>),
}

fn shape_of(input: &DeriveInput) -> syn::Result<Shape<'_>> {
    let data = match &input.data {
        Data::Struct(data) => data,
        Data::Enum(e) => {
            return Err(syn::Error::new(
                e.enum_token.span,
                "hprose derives support structs only",
            ))
        }
        Data::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span,
                "hprose derives support structs only",
            ))
        }
    };
    match &data.fields {
        Fields::Named(fields) => {
            let mut infos = Vec::with_capacity(fields.named.len());
            for f in &fields.named {
                let attrs = get_field_attributes(&f.attrs)?;
                if attrs.skip {
                    continue;
                }
                infos.push(FieldInfo {
                    ident: f.ident.as_ref().ok_or_else(|| {
                        syn::Error::new(Span::call_site(), "named field without a name")
                    })?,
                    ty: &f.ty,
                    attrs,
                });
            }
            check_duplicate_aliases(&input.ident, &infos);
            Ok(Shape::Object(infos))
        }
        Fields::Unnamed(fields) => Ok(Shape::Tuple(fields.unnamed.iter().map(|f| &f.ty).collect())),
        Fields::Unit => Ok(Shape::Object(Vec::new())),
    }
}

/// The `Struct` impl: class name, flattened field count and field descriptions.
fn struct_impl(input: &DeriveInput, fields: &[FieldInfo]) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let attrs = get_struct_attributes(&input.attrs)?;
    let class_name = attrs.name.unwrap_or_else(|| unraw(name));
    let generics = add_bounds(&input.generics, quote!('static));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let counts = fields.iter().map(|f| {
        let ty = f.ty;
        if f.attrs.flatten {
            quote! { <#ty as ::hprose_encoder::Struct>::FIELD_COUNT }
        } else {
            quote! { 1 }
        }
    });
    let describes = fields.iter().map(|f| {
        let ty = f.ty;
        if f.attrs.flatten {
            return quote! { <#ty as ::hprose_encoder::Struct>::describe(out); };
        }
        let field_name = unraw(f.ident);
        let namespaces = f.attrs.aliases.iter().map(|(ns, _)| ns);
        let aliases = f.attrs.aliases.iter().map(|(_, alias)| alias);
        quote! {
            out.push(::hprose_encoder::FieldDesc {
                name: #field_name,
                type_name: ::std::any::type_name::<#ty>(),
                aliases: &[#((#namespaces, #aliases)),*],
            });
        }
    });

    Ok(quote! {
        impl #impl_generics ::hprose_encoder::Struct for #name #ty_generics #where_clause {
            const NAME: &'static str = #class_name;
            const FIELD_COUNT: usize = 0 #(+ #counts)*;

            fn describe(out: &mut ::std::vec::Vec<::hprose_encoder::FieldDesc>) {
                #(#describes)*
            }
        }
    })
}

/// Derive macro for the `Struct` trait alone
///
/// Needed next to `#[derive(Decode)]` for types that are decoded but never encoded.
#[proc_macro_derive(Struct, attributes(hprose))]
pub fn derive_struct(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = match shape_of(&input) {
        Ok(Shape::Object(fields)) => struct_impl(&input, &fields),
        Ok(Shape::Tuple(_)) => Err(syn::Error::new_spanned(
            &input.ident,
            "tuple structs are encoded as lists and have no class",
        )),
        Err(err) => Err(err),
    };
    expanded.unwrap_or_else(syn::Error::into_compile_error).into()
}

/// Derive macro for implementing the `Encode` trait
///
/// Structs with named fields are written as a class definition (once per session) and an
/// object; with `#[hprose(as_map)]` as a map from field aliases to values. Tuple structs are
/// written as lists. The derive also implements `Struct` for structs with named fields.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Encode)]
/// #[hprose(name = "User")]
/// struct UserRecord {
///     #[hprose(rename = "id")]
///     user_id: u32,
///     #[hprose(skip)]
///     cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Encode, attributes(hprose))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    encode_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn encode_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let generics = add_bounds(&input.generics, quote!(::hprose_encoder::Encode + 'static));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match shape_of(input)? {
        Shape::Tuple(types) => {
            let count = types.len();
            let indexes = (0..count).map(syn::Index::from);
            return Ok(quote! {
                impl #impl_generics ::hprose_encoder::Encode for #name #ty_generics #where_clause {
                    fn encode(&self, enc: &mut ::hprose_encoder::Encoder) {
                        enc.write_list_head(#count);
                        #(::hprose_encoder::Encode::encode(&self.#indexes, enc);)*
                        enc.write_foot();
                    }
                }
            });
        }
        Shape::Object(fields) => fields,
    };

    let struct_impl = struct_impl(input, &fields)?;
    let as_map = get_struct_attributes(&input.attrs)?.as_map;
    let field_encode = fields.iter().map(|f| {
        let ident = f.ident;
        let ty = f.ty;
        if f.attrs.flatten {
            quote! {
                if index < base + <#ty as ::hprose_encoder::Struct>::FIELD_COUNT {
                    ::hprose_encoder::StructEncode::encode_field(&self.#ident, index - base, enc);
                    return;
                }
                base += <#ty as ::hprose_encoder::Struct>::FIELD_COUNT;
            }
        } else {
            quote! {
                if index == base {
                    ::hprose_encoder::Encode::encode(&self.#ident, enc);
                    return;
                }
                base += 1;
            }
        }
    });
    let write = if as_map {
        quote! { enc.write_struct_map(self); }
    } else {
        quote! { enc.write_struct(self); }
    };

    Ok(quote! {
        #struct_impl

        impl #impl_generics ::hprose_encoder::StructEncode for #name #ty_generics #where_clause {
            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn encode_field(&self, index: usize, enc: &mut ::hprose_encoder::Encoder) {
                let mut base = 0usize;
                #(#field_encode)*
                enc.write_nil();
            }
        }

        impl #impl_generics ::hprose_encoder::Encode for #name #ty_generics #where_clause {
            fn encode(&self, enc: &mut ::hprose_encoder::Encoder) {
                #write
            }
        }
    })
}

/// Derive macro for implementing the `Decode` trait
///
/// Structs with named fields are read from an object, a map keyed by field alias or a list
/// of field values. They must implement `Default` (missing and skipped fields keep their
/// default) and `Struct`, which `#[derive(Encode)]` or `#[derive(Struct)]` provides.
/// Tuple structs are read from lists of exactly their arity.
///
/// # Examples
///
/// A type that is only ever decoded derives `Struct` next to `Decode`:
///
/// ```rust,ignore
/// #[derive(Decode, Struct, Default)]
/// struct Reply {
///     status: i32,
///     message: String,
/// }
/// ```
#[proc_macro_derive(Decode, attributes(hprose))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    decode_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn decode_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let generics = add_bounds(&input.generics, quote!(::hprose_encoder::Decode + 'static));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match shape_of(input)? {
        Shape::Tuple(types) => {
            let count = types.len();
            let slots: Vec<Ident> = (0..count)
                .map(|i| Ident::new(&format!("field{}", i), Span::call_site()))
                .collect();
            let arms = izip!(0..count, &slots).map(|(i, slot)| {
                quote! { #i => #slot = ::std::option::Option::Some(dec.decode()?), }
            });
            let declarations = izip!(&slots, &types).map(|(slot, ty)| {
                quote! { let mut #slot: ::std::option::Option<#ty> = ::std::option::Option::None; }
            });
            return Ok(quote! {
                impl #impl_generics ::hprose_encoder::Decode for #name #ty_generics #where_clause {
                    fn decode(dec: &mut ::hprose_encoder::Decoder, tag: u8) -> ::hprose_encoder::Result<Self> {
                        let target = ::std::any::type_name::<Self>();
                        dec.read_tuple_head(tag, #count, target)?;
                        #(#declarations)*
                        dec.read_body(#count, 1, |dec, i| {
                            match i {
                                #(#arms)*
                                _ => dec.skip_value()?,
                            }
                            Ok(())
                        })?;
                        let missing = || ::hprose_encoder::HproseError::Cast { from: "list", to: target };
                        Ok(#name(#(#slots.ok_or_else(missing)?),*))
                    }
                }
            });
        }
        Shape::Object(fields) => fields,
    };

    let field_decode = fields.iter().map(|f| {
        let ident = f.ident;
        let ty = f.ty;
        if f.attrs.flatten {
            quote! {
                if index < base + <#ty as ::hprose_encoder::Struct>::FIELD_COUNT {
                    return ::hprose_encoder::StructDecode::decode_field(&mut self.#ident, index - base, dec, tag);
                }
                base += <#ty as ::hprose_encoder::Struct>::FIELD_COUNT;
            }
        } else {
            quote! {
                if index == base {
                    self.#ident = dec.decode_tagged(tag)?;
                    return Ok(());
                }
                base += 1;
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::hprose_encoder::StructDecode for #name #ty_generics #where_clause {
            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn decode_field(
                &mut self,
                index: usize,
                dec: &mut ::hprose_encoder::Decoder,
                tag: u8,
            ) -> ::hprose_encoder::Result<()> {
                let mut base = 0usize;
                #(#field_decode)*
                dec.skip_tagged(tag)
            }
        }

        impl #impl_generics ::hprose_encoder::Decode for #name #ty_generics #where_clause {
            fn decode(dec: &mut ::hprose_encoder::Decoder, tag: u8) -> ::hprose_encoder::Result<Self> {
                dec.read_struct::<Self>(tag)
            }
        }
    })
}
