use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned};

/// Implements `memoorm::Entity` for a struct with named fields.
///
/// Struct options: `#[entity(name = "...", table = "...")]`.
/// Field options: `#[id]`, `#[column(name = "...")]`, `#[transient]`.
/// Without `#[id]` the field called `id` is the identity.
#[proc_macro_derive(Entity, attributes(entity, id, column, transient))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct EntityOptions {
    name: Option<LitStr>,
    table: Option<LitStr>,
}

#[derive(Default)]
struct FieldOptions {
    id: bool,
    transient: bool,
    column: Option<LitStr>,
}

struct MappedField {
    ident: Ident,
    ty: Type,
    column: String,
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Entity does not support generic structs",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;

    let Data::Struct(data_struct) = input.data else {
        return Err(syn::Error::new(
            struct_name.span(),
            "Entity can only be derived for structs",
        ));
    };
    let Fields::Named(named_fields) = data_struct.fields else {
        return Err(syn::Error::new(
            struct_name.span(),
            "Entity requires named fields",
        ));
    };

    let mut id_field: Option<MappedField> = None;
    let mut implicit_id: Option<MappedField> = None;
    let mut properties = Vec::<MappedField>::new();

    for field in named_fields.named {
        let span = field.span();
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(span, "Entity requires named fields"))?;
        let field_options = parse_field_options(&field.attrs)?;
        if field_options.transient {
            if field_options.id || field_options.column.is_some() {
                return Err(syn::Error::new(
                    span,
                    "#[transient] cannot be combined with #[id] or #[column]",
                ));
            }
            continue;
        }

        let mapped = MappedField {
            column: field_options
                .column
                .map(|lit| lit.value())
                .unwrap_or_else(|| ident.to_string().to_ascii_lowercase()),
            ident,
            ty: field.ty,
        };

        if field_options.id {
            if id_field.is_some() {
                return Err(syn::Error::new(span, "Entity allows a single #[id] field"));
            }
            id_field = Some(mapped);
        } else if mapped.ident == "id" {
            implicit_id = Some(mapped);
        } else {
            properties.push(mapped);
        }
    }

    // An explicit #[id] elsewhere turns a plain `id` field into a property.
    let id_field = match (id_field, implicit_id) {
        (Some(id), Some(plain)) => {
            properties.insert(0, plain);
            id
        }
        (Some(id), None) | (None, Some(id)) => id,
        (None, None) => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity needs an #[id] field or a field named `id`",
            ));
        }
    };

    let entity_name = options
        .name
        .map(|lit| lit.value())
        .unwrap_or_else(|| struct_name.to_string());
    let table = options.table.map(|lit| quote! { .table(#lit) });

    let id_ident = &id_field.ident;
    let id_ty = &id_field.ty;
    let id_property = id_ident.to_string();
    let id_column = &id_field.column;

    let accessors = properties.iter().map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;
        let property = ident.to_string();
        let column = &field.column;
        quote! {
            .property(::memoorm::PropertyAccessor::new(
                #property,
                #column,
                <#ty as ::memoorm::PersistValue>::data_type(),
                <#ty as ::memoorm::PersistValue>::nullable(),
                |entity: &Self| ::memoorm::PersistValue::to_value(&entity.#ident),
                |entity: &mut Self, value: ::memoorm::Value| {
                    entity.#ident = <#ty as ::memoorm::PersistValue>::from_value(value)?;
                    ::std::result::Result::Ok(())
                },
            ))
        }
    });

    Ok(quote! {
        impl ::memoorm::Entity for #struct_name {
            fn entity_meta() -> ::memoorm::Result<::memoorm::EntityMeta<Self>> {
                ::memoorm::EntityMeta::builder(#entity_name)
                    #table
                    .id(
                        #id_property,
                        #id_column,
                        |entity: &Self| <#id_ty as ::memoorm::IdentityValue>::identity(&entity.#id_ident),
                        |entity: &mut Self, id: i64| {
                            entity.#id_ident = <#id_ty as ::memoorm::IdentityValue>::from_identity(id);
                        },
                    )
                    #(#accessors)*
                    .build()
            }
        }
    })
}

fn parse_entity_options(attrs: &[Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                options.name = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("table") {
                options.table = Some(meta.value()?.parse()?);
                return Ok(());
            }
            Err(meta.error(
                "Unsupported #[entity(...)] option. Supported: name = \"...\", table = \"...\"",
            ))
        })?;
    }
    Ok(options)
}

fn parse_field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs {
        if attr.path().is_ident("id") {
            attr.meta.require_path_only()?;
            options.id = true;
        } else if attr.path().is_ident("transient") {
            attr.meta.require_path_only()?;
            options.transient = true;
        } else if attr.path().is_ident("column") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    options.column = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                Err(meta.error("Unsupported #[column(...)] option. Supported: name = \"...\""))
            })?;
        }
    }
    Ok(options)
}
