//! Address parsing and validation.
//!
//! Two address families pass through here: `module:` addresses naming a
//! module (and optionally a path inside it), and physical locations such as
//! `file:///opt/app/mods/core.jar` or `jrt:/java.base` that say where a
//! module's bytes live.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{ModuleFsError, ModuleFsResult};

/// Scheme of module addresses.
pub const MODULE_SCHEME: &str = "module";

/// A URI split into its RFC 3986 components.
///
/// An empty authority (`file:///x`) is reported as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    /// Split `input` into components.
    ///
    /// Characters that must be percent-encoded in a URI are rejected, as are
    /// malformed `%` escapes.
    pub fn parse(input: &str) -> ModuleFsResult<Self> {
        check_characters(input)?;
        let (scheme, rest) = input
            .split_once(':')
            .ok_or_else(|| ModuleFsError::invalid_uri(input, "missing scheme"))?;

        let mut chars = scheme.chars();
        let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(ModuleFsError::invalid_uri(input, "malformed scheme"));
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(hier) => {
                let end = hier.find('/').unwrap_or(hier.len());
                let authority = &hier[..end];
                let authority = (!authority.is_empty()).then(|| authority.to_string());
                (authority, &hier[end..])
            }
            None => (None, rest),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            authority,
            path: path.to_string(),
            query,
            fragment,
        })
    }

    /// Scheme, as written.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authority component, if present and non-empty.
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Raw (still percent-encoded) path component.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query component.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Fragment component.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Path component with `%XX` escapes decoded.
    pub fn decoded_path(&self) -> ModuleFsResult<String> {
        percent_decode_str(&self.path)
            .decode_utf8()
            .map(|path| path.into_owned())
            .map_err(|_| ModuleFsError::invalid_uri(self.to_string(), "path is not UTF-8"))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(authority) = &self.authority {
            write!(f, "//{authority}")?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// A validated `module:` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAddress {
    module: String,
    /// Path inside the module, without the leading slash. Empty for the
    /// module root.
    path: String,
}

impl ModuleAddress {
    /// Parse the filesystem-identity form `module:/<name>`.
    ///
    /// Anything after the module name, including a trailing slash, is
    /// rejected.
    pub fn parse_filesystem(input: &str) -> ModuleFsResult<Self> {
        let address = Self::parse_checked(input)?;
        if !address.path.is_empty() || input_has_trailing_slash(input) {
            return Err(ModuleFsError::invalid_uri(
                input,
                "path component should not contain '/' other than at the start",
            ));
        }
        Ok(address)
    }

    /// Parse the combined form `module:/<name>[/<in-module-path>]`.
    pub fn parse_path(input: &str) -> ModuleFsResult<Self> {
        Self::parse_checked(input)
    }

    fn parse_checked(input: &str) -> ModuleFsResult<Self> {
        let uri = Uri::parse(input)?;

        if !uri.scheme().eq_ignore_ascii_case(MODULE_SCHEME) {
            return Err(ModuleFsError::invalid_uri(input, "URI does not match the module scheme"));
        }
        if uri.authority().is_some() || uri.path().starts_with("//") {
            return Err(ModuleFsError::invalid_uri(input, "authority component present"));
        }
        if uri.path().is_empty() {
            return Err(ModuleFsError::invalid_uri(input, "path component is undefined"));
        }
        let decoded = uri.decoded_path()?;
        let Some(path) = decoded.strip_prefix('/') else {
            return Err(ModuleFsError::invalid_uri(input, "path component should start with '/'"));
        };
        if path.split('/').any(|segment| segment == "..") {
            return Err(ModuleFsError::invalid_uri(input, "invalid path component"));
        }
        if uri.query().is_some() {
            return Err(ModuleFsError::invalid_uri(input, "query component present"));
        }
        if uri.fragment().is_some() {
            return Err(ModuleFsError::invalid_uri(input, "fragment component present"));
        }

        let (module, in_module) = path.split_once('/').unwrap_or((path, ""));
        if module.is_empty() {
            return Err(ModuleFsError::invalid_uri(input, "module name is empty"));
        }

        Ok(Self {
            module: module.to_string(),
            path: in_module.trim_end_matches('/').to_string(),
        })
    }

    /// Module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Path inside the module, relative, without leading or trailing slash.
    pub fn in_module_path(&self) -> &str {
        &self.path
    }

    /// The filesystem-identity address for this module.
    pub fn filesystem_address(&self) -> String {
        filesystem_address(&self.module)
    }
}

/// Characters escaped when a path segment is written into an address.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode one path segment for use in an address.
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Format the filesystem-identity address of a module.
pub fn filesystem_address(module: &str) -> String {
    format!("{MODULE_SCHEME}:/{module}")
}

fn check_characters(input: &str) -> ModuleFsResult<()> {
    let bytes = input.as_bytes();
    for (i, c) in input.char_indices() {
        if c == '%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(ModuleFsError::invalid_uri(input, "malformed percent escape"));
            }
        } else if c.is_ascii_control()
            || matches!(c, ' ' | '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}')
        {
            return Err(ModuleFsError::invalid_uri(input, "character must be percent-encoded"));
        }
    }
    Ok(())
}

fn input_has_trailing_slash(input: &str) -> bool {
    input
        .split(['?', '#'])
        .next()
        .is_some_and(|s| s.ends_with('/'))
}
