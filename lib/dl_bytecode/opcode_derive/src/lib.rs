// allowing panics since this is the standard way to show an
// error message from a proc-macro derive crate.
#![allow(clippy::panic)]

//! This crate introduces a proc macro derive building the Dalvik opcode
//! table of `dl_bytecode::opcodes::Opcode` from proc macro attributes.
//!
//! Each opcode is a unit variant carrying its encoded value, its mnemonic,
//! the instruction format it is decoded with, the opcode family used by the
//! lifter to pick a lowering rule, and optional operand kind information.
//! Keeping all of this next to the variant lets the compiler check that
//! every opcode declares a family (the lowering dispatch is an exhaustive
//! `match` over families).

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Fields, Ident, Lit, LitBool, LitInt,
    LitStr, Meta, MetaNameValue, NestedMeta, Variant,
};

/// The main Dalvik `Opcode` proc macro derive.
///
/// It derives an inherent implementation on a fieldless enum, using the
/// following attributes:
/// - `value` is the encoded opcode byte,
/// - `mnemonic` is the name used in assembly listings,
/// - `format` is the Dalvik instruction format (`"12x"`, `"35c"`, ...), mapped
///   onto the `Format::F12x`, `Format::F35c`, ... variants,
/// - `family` names the `Family` variant of the opcode,
/// - `kind` and `to` (optional) name `OperandKind` variants, for the operand
///   kind and for the result kind of conversions,
/// - `can_throw` indicates if the instruction may throw an exception (default: `false`).
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, opcode_derive::Opcode)]
/// pub enum Opcode {
///     #[opcode(value = 0x7b, mnemonic = "neg-int", format = "12x", family = "Neg", kind = "Int")]
///     NegInt,
/// }
/// ```
#[proc_macro_derive(Opcode, attributes(opcode))]
pub fn opcode_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let gen = derive_opcode_all(&ast);
    gen.into()
}

fn derive_opcode_all(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let Data::Enum(data) = &ast.data else {
        panic!("#[derive(Opcode)] is only defined for enums")
    };
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            panic!("#[derive(Opcode)] expects unit variants only");
        }
    }

    let opcode_impl = derive_opcode_impl(name, data);

    quote! {
        #opcode_impl
    }
}

fn derive_opcode_impl(name: &Ident, data: &DataEnum) -> TokenStream2 {
    let idents: Vec<&Ident> = data.variants.iter().map(|v| &v.ident).collect();

    let value_matches = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        let value = get_opcode_int_value(&variant.attrs, "value");
        quote! { #name::#ident => #value, }
    });

    let from_value_matches = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        let value = get_opcode_int_value(&variant.attrs, "value");
        quote! { #value => Some(#name::#ident), }
    });

    let mnemonic_matches = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        let mnemonic = get_opcode_string_value(&variant.attrs, "mnemonic");
        quote! { #name::#ident => #mnemonic, }
    });

    let from_mnemonic_matches = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        let mnemonic = get_opcode_string_value(&variant.attrs, "mnemonic");
        quote! { #mnemonic => Some(#name::#ident), }
    });

    let format_matches = data.variants.iter().map(format_match);
    let family_matches = data.variants.iter().map(family_match);
    let kind_matches = data.variants.iter().map(|v| operand_kind_match(v, "kind"));
    let to_matches = data.variants.iter().map(|v| operand_kind_match(v, "to"));

    let canthrow_matches = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        let canthrow = get_opcode_bool_value(&variant.attrs, "can_throw");
        quote! { #name::#ident => #canthrow, }
    });

    quote! {
        impl #name {
            /// Every opcode of the table, in declaration order.
            pub const ALL: &'static [#name] = &[#(#name::#idents),*];

            /// Returns the opcode encoded by the given byte, if any.
            #[must_use]
            pub const fn from_value(value: u8) -> Option<Self> {
                match value {
                    #(#from_value_matches)*
                    _ => None,
                }
            }

            /// Returns the opcode designated by the given assembly mnemonic, if any.
            #[must_use]
            pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
                match mnemonic {
                    #(#from_mnemonic_matches)*
                    _ => None,
                }
            }

            #[must_use]
            pub const fn value(self) -> u8 {
                match self {
                    #(#value_matches)*
                }
            }

            #[must_use]
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    #(#mnemonic_matches)*
                }
            }

            #[must_use]
            pub const fn format(self) -> Format {
                match self {
                    #(#format_matches)*
                }
            }

            #[must_use]
            pub const fn family(self) -> Family {
                match self {
                    #(#family_matches)*
                }
            }

            /// Kind of the operands the opcode works on, when the opcode
            /// declares one.
            #[must_use]
            pub const fn kind(self) -> Option<OperandKind> {
                match self {
                    #(#kind_matches)*
                }
            }

            /// Kind of the result for conversion opcodes.
            #[must_use]
            pub const fn target_kind(self) -> Option<OperandKind> {
                match self {
                    #(#to_matches)*
                }
            }

            #[must_use]
            pub const fn can_throw(self) -> bool {
                match self {
                    #(#canthrow_matches)*
                }
            }
        }
    }
}

fn format_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let format = get_opcode_string_value(&variant.attrs, "format").value();
    if format.len() != 3 || !format.chars().next().expect("first char").is_ascii_digit() {
        panic!("bad 'format' attribute: {format}");
    }
    let format_ident = Ident::new(&format!("F{format}"), Span::call_site());

    quote! {
        Self::#ident => Format::#format_ident,
    }
}

fn family_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let family = get_opcode_string_value(&variant.attrs, "family").value();
    let family_ident = Ident::new(&family, Span::call_site());

    quote! {
        Self::#ident => Family::#family_ident,
    }
}

fn operand_kind_match(variant: &Variant, attr: &str) -> TokenStream2 {
    let ident = &variant.ident;
    match find_opcode_string_value(&variant.attrs, attr) {
        Some(kind) => {
            let kind_ident = Ident::new(&kind.value(), Span::call_site());
            quote! { Self::#ident => Some(OperandKind::#kind_ident), }
        }
        None => quote! { Self::#ident => None, },
    }
}

fn get_opcode_values(attr: &Attribute) -> Vec<MetaNameValue> {
    if !attr.path.is_ident("opcode") {
        return Vec::new();
    }

    match attr.parse_meta() {
        Ok(Meta::NameValue(v)) => vec![v],
        Ok(Meta::List(meta)) => meta
            .nested
            .into_iter()
            .map(|nested| match nested {
                NestedMeta::Meta(Meta::Path(path)) => {
                    let span = path
                        .segments
                        .first()
                        .expect("path first segment")
                        .ident
                        .span();
                    MetaNameValue {
                        path,
                        eq_token: syn::token::Eq { spans: [span] },
                        lit: Lit::Bool(LitBool { value: true, span }),
                    }
                }
                NestedMeta::Meta(Meta::NameValue(n)) => n,
                _ => panic!("expected #[opcode(...)]"),
            })
            .collect(),
        _ => panic!("expected #[opcode(...)]"),
    }
}

fn find_opcode_string_value(attrs: &[Attribute], name: &str) -> Option<LitStr> {
    for name_value in attrs.iter().flat_map(get_opcode_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Str(s) => return Some(s.clone()),
                _ => panic!("expected string for '{name}' value"),
            }
        }
    }
    None
}

fn get_opcode_string_value(attrs: &[Attribute], name: &str) -> LitStr {
    find_opcode_string_value(attrs, name).unwrap_or_else(|| panic!("missing '{name}' attribute"))
}

fn get_opcode_int_value(attrs: &[Attribute], name: &str) -> LitInt {
    for name_value in attrs.iter().flat_map(get_opcode_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Int(i) => {
                    let value: u8 = i
                        .base10_parse()
                        .unwrap_or_else(|_| panic!("'{name}' must fit in a byte"));
                    return LitInt::new(&format!("{value}u8"), i.span());
                }
                _ => panic!("expected integer for '{name}' value"),
            }
        }
    }
    panic!("missing '{name}' attribute");
}

fn get_opcode_bool_value(attrs: &[Attribute], name: &str) -> LitBool {
    for name_value in attrs.iter().flat_map(get_opcode_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Bool(b) => return b.clone(),
                _ => panic!("expected bool for '{name}' value"),
            }
        }
    }
    LitBool {
        value: false,
        span: Span::call_site(),
    }
}
