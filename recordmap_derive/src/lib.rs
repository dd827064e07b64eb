use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned};

/// Derives `recordmap::Entity` for a struct with named fields.
///
/// Container: `#[entity(name = "...")]`. Fields: `#[column(id)]`,
/// `#[column(name = "...")]`, `#[column(converter = "...")]`,
/// `#[column(skip)]`.
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_mapped(input, MarkerKind::Entity) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `recordmap::Entity` for a type that is only stored inside other
/// entities.
#[proc_macro_derive(Embeddable, attributes(entity, column))]
pub fn derive_embeddable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_mapped(input, MarkerKind::Embeddable) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Clone, Copy)]
enum MarkerKind {
    Entity,
    Embeddable,
}

impl MarkerKind {
    fn label(self) -> &'static str {
        match self {
            Self::Entity => "Entity",
            Self::Embeddable => "Embeddable",
        }
    }
}

impl ToTokens for MarkerKind {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let variant = Ident::new(self.label(), proc_macro2::Span::call_site());
        tokens.extend(quote!(::recordmap::access::EntityMarker::#variant));
    }
}

#[derive(Default)]
struct EntityOptions {
    name: Option<String>,
}

#[derive(Default)]
struct ColumnOptions {
    name: Option<String>,
    converter: Option<String>,
    id: bool,
    skip: bool,
}

struct MappedField {
    ident: Ident,
    ty: Type,
    options: ColumnOptions,
}

fn expand_mapped(input: DeriveInput, marker: MarkerKind) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;
    let label = marker.label();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            format!("{label} does not support generic structs yet"),
        ));
    }

    let entity_options = parse_entity_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                format!("{label} can only be derived for structs"),
            ));
        }
    };

    let named_fields: Vec<syn::Field> = match data_struct.fields {
        Fields::Named(fields) => fields.named.into_iter().collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new(
                struct_name.span(),
                format!("{label} requires named fields"),
            ));
        }
    };

    let mut fields = Vec::<MappedField>::new();
    let mut id_field: Option<Ident> = None;
    let mut record_names = Vec::<String>::new();

    for field in named_fields {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), format!("{label} requires named fields")))?;
        let options = parse_column_options(&field.attrs)?;
        if options.skip {
            if options.id {
                return Err(syn::Error::new(ident.span(), "An id field cannot be skipped"));
            }
            continue;
        }

        if options.id {
            if let Some(previous) = &id_field {
                return Err(syn::Error::new(
                    ident.span(),
                    format!("{struct_name} already declares `{previous}` as its id field"),
                ));
            }
            id_field = Some(ident.clone());
        }

        let record_name = options.name.clone().unwrap_or_else(|| unraw(&ident));
        if record_names.contains(&record_name) {
            return Err(syn::Error::new(
                ident.span(),
                format!("Record name '{record_name}' is used by more than one field"),
            ));
        }
        record_names.push(record_name);

        fields.push(MappedField {
            ident,
            ty: field.ty,
            options,
        });
    }

    let name_expr = match entity_options.name {
        Some(name) => quote!(#name),
        None => {
            let simple = struct_name.to_string();
            quote!(#simple)
        }
    };

    let descriptors = fields
        .iter()
        .map(|field| field_descriptor(&struct_name, field))
        .collect::<Vec<_>>();

    Ok(quote! {
        impl ::recordmap::access::Entity for #struct_name {
            const MARKER: ::recordmap::access::EntityMarker = #marker;

            fn describe() -> ::recordmap::access::EntityDescriptor {
                ::recordmap::access::EntityDescriptor {
                    type_name: ::std::any::type_name::<Self>(),
                    name: ::std::string::ToString::to_string(#name_expr),
                    marker: #marker,
                    fields: ::std::vec![#(#descriptors),*],
                    constructor: ::recordmap::access::construct::<Self>,
                }
            }
        }

        impl ::recordmap::access::FieldType for #struct_name {
            fn declared_type() -> ::recordmap::access::DeclaredType {
                ::recordmap::access::DeclaredType::entity::<Self>()
            }

            fn read(&self) -> ::recordmap::access::FieldRef<'_> {
                ::recordmap::access::FieldRef::Entity(::recordmap::access::EntityRef::new(self))
            }

            fn write(value: ::recordmap::access::FieldValue) -> ::recordmap::Result<Self> {
                value.into_entity::<Self>()
            }
        }
    })
}

fn field_descriptor(struct_name: &Ident, field: &MappedField) -> TokenStream2 {
    let ident = &field.ident;
    let ty = &field.ty;
    let field_name = unraw(ident);
    let record_name = field.options.name.clone().unwrap_or_else(|| field_name.clone());
    let is_id = field.options.id;
    let converter = match &field.options.converter {
        Some(id) => quote!(::std::option::Option::Some(::std::string::ToString::to_string(#id))),
        None => quote!(::std::option::Option::None),
    };

    quote! {
        {
            fn get(
                instance: &dyn ::std::any::Any,
            ) -> ::recordmap::Result<::recordmap::access::FieldRef<'_>> {
                let entity = ::recordmap::access::downcast_ref::<#struct_name>(instance, #field_name)?;
                ::std::result::Result::Ok(::recordmap::access::FieldType::read(&entity.#ident))
            }

            fn set(
                instance: &mut dyn ::std::any::Any,
                value: ::recordmap::access::FieldValue,
            ) -> ::recordmap::Result<()> {
                let entity = ::recordmap::access::downcast_mut::<#struct_name>(instance, #field_name)?;
                entity.#ident = <#ty as ::recordmap::access::FieldType>::write(value)?;
                ::std::result::Result::Ok(())
            }

            ::recordmap::access::FieldDescriptor {
                field_name: #field_name,
                record_name: ::std::string::ToString::to_string(#record_name),
                id: #is_id,
                converter: #converter,
                declared: <#ty as ::recordmap::access::FieldType>::declared_type(),
                get,
                set,
            }
        }
    }
}

fn unraw(ident: &Ident) -> String {
    ident.to_string().trim_start_matches("r#").to_string()
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.name = Some(lit.value());
                return Ok(());
            }

            Err(meta.error("Unsupported entity attribute. Supported: name = \"...\""))
        })?;
    }

    Ok(options)
}

fn parse_column_options(attrs: &[syn::Attribute]) -> syn::Result<ColumnOptions> {
    let mut options = ColumnOptions::default();
    let mut seen = false;

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }

        if seen {
            return Err(syn::Error::new(
                attr.span(),
                "Duplicate #[column(...)] attribute on field",
            ));
        }
        seen = true;

        match &attr.meta {
            syn::Meta::Path(_) => {}
            syn::Meta::List(list) => {
                list.parse_nested_meta(|meta| {
                    if meta.path.is_ident("id") {
                        options.id = true;
                        return Ok(());
                    }

                    if meta.path.is_ident("skip") {
                        options.skip = true;
                        return Ok(());
                    }

                    if meta.path.is_ident("name") {
                        let value = meta.value()?;
                        let lit: LitStr = value.parse()?;
                        options.name = Some(lit.value());
                        return Ok(());
                    }

                    if meta.path.is_ident("converter") {
                        let value = meta.value()?;
                        let lit: LitStr = value.parse()?;
                        options.converter = Some(lit.value());
                        return Ok(());
                    }

                    Err(meta.error(
                        "Unsupported #[column(...)] option. Supported: id, skip, name = \"...\", converter = \"...\"",
                    ))
                })?;
            }
            syn::Meta::NameValue(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "Unsupported #[column = ...] syntax. Use #[column(id)], #[column(name = \"...\")]",
                ));
            }
        }
    }

    Ok(options)
}
