//! Derive macro for `polyvoice_core::parameter::ParamName`.
use darling::{ast, FromDeriveInput, FromVariant};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

/// Derive `ParamName` on a unit-only enum. Variant IDs follow declaration order.
///
/// The display name defaults to the variant identifier split into words (`SawLevel` becomes
/// `"Saw Level"`), and can be overridden with `#[param_name(display = "...")]`.
#[proc_macro_derive(ParamName, attributes(param_name))]
pub fn derive_param_name(item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::DeriveInput);
    match ParamEnum::from_derive_input(&input).and_then(|e| e.expand()) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.write_errors().into(),
    }
}

#[derive(Debug, FromVariant)]
#[darling(supports(unit), attributes(param_name))]
struct ParamVariant {
    ident: syn::Ident,
    display: Option<String>,
}

impl ParamVariant {
    fn display_name(&self) -> String {
        self.display
            .clone()
            .unwrap_or_else(|| split_words(&self.ident.to_string()))
    }
}

#[derive(Debug, FromDeriveInput)]
#[darling(supports(enum_unit))]
struct ParamEnum {
    ident: syn::Ident,
    data: ast::Data<ParamVariant, ()>,
}

impl ParamEnum {
    fn variants(&self) -> &[ParamVariant] {
        match &self.data {
            ast::Data::Enum(variants) => variants.as_slice(),
            ast::Data::Struct(_) => &[],
        }
    }

    fn expand(&self) -> darling::Result<TokenStream2> {
        let variants = self.variants();
        if variants.is_empty() {
            return Err(darling::Error::custom("parameter enums need at least one variant")
                .with_span(&self.ident));
        }

        let ident = &self.ident;
        let count = variants.len();
        let idents = variants.iter().map(|v| &v.ident).collect::<Vec<_>>();
        let paths = idents.iter().map(|v| quote!(#ident::#v));
        let ids = 0..count;
        let names = variants.iter().map(ParamVariant::display_name);
        Ok(quote! {
            impl ::polyvoice_core::parameter::ParamName for #ident {
                fn count() -> usize {
                    #count
                }

                fn from_id(id: ::polyvoice_core::parameter::ParamId) -> Self {
                    const ALL: [#ident; #count] = [#(#paths),*];
                    ALL[id.min(#count - 1)]
                }

                fn into_id(self) -> ::polyvoice_core::parameter::ParamId {
                    match self {
                        #(Self::#idents => #ids),*
                    }
                }

                fn name(&self) -> ::std::borrow::Cow<'static, str> {
                    const NAMES: [&str; #count] = [#(#names),*];
                    ::std::borrow::Cow::Borrowed(NAMES[self.into_id()])
                }
            }
        })
    }
}

/// Insert a space before each uppercase letter that starts a new word. Acronyms stay together.
fn split_words(ident: &str) -> String {
    let chars = ident.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || (chars[i - 1].is_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn expand(source: &str) -> darling::Result<String> {
        let input = syn::parse_str(source).expect("Parsing valid code");
        ParamEnum::from_derive_input(&input)?
            .expand()
            .map(|t| t.to_string())
    }

    #[rstest]
    #[case("Cutoff", "Cutoff")]
    #[case("SawLevel", "Saw Level")]
    #[case("AegVelocitySens", "Aeg Velocity Sens")]
    #[case("LFOShape", "LFO Shape")]
    #[case("Osc2Level", "Osc2 Level")]
    fn identifiers_split_into_words(#[case] ident: &str, #[case] expected: &str) {
        assert_eq!(expected, split_words(ident));
    }

    #[test]
    fn derive_emits_every_variant() {
        let output = expand(
            r#"enum DspParams {
                Cutoff,
                FilterResonance,
                Drive,
                #[param_name(display = "Input FM")]
                InputFM,
            }"#,
        )
        .expect("Deriving on a unit enum");
        assert!(output.contains("4usize"));
        assert!(output.contains("\"Input FM\""));
        assert!(output.contains("\"Filter Resonance\""));
        assert!(output.contains("DspParams :: InputFM"));
    }

    #[test]
    fn derive_rejects_tuple_variants() {
        assert!(expand("enum Bad { A(u8) }").is_err());
    }

    #[test]
    fn derive_rejects_empty_enums() {
        assert!(expand("enum Empty {}").is_err());
    }
}
