//! Identifier naming
//!
//! Column and table names become struct/field/argument names here. The `id`
//! part is uppercased as an initialism so `user_id` reads as `UserID`.

/// PascalCase a snake_case identifier.
pub(crate) fn struct_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for part in split_parts(name) {
        if part.eq_ignore_ascii_case("id") {
            out.push_str("ID");
        } else {
            out.push_str(&capitalize(part));
        }
    }
    out
}

/// camelCase a snake_case identifier, for scalar argument names.
pub(crate) fn arg_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in split_parts(name).enumerate() {
        if i == 0 {
            out.push_str(&part.to_lowercase());
        } else if part.eq_ignore_ascii_case("id") {
            out.push_str("ID");
        } else {
            out.push_str(&capitalize(part));
        }
    }
    out
}

/// Reverse of [`struct_name`], used for embed tag names.
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = true;
        }
    }
    out
}

/// The positional fallback name for unnamed expression columns, 1-based.
pub(crate) fn column_name(name: &str, pos: usize) -> String {
    if !name.is_empty() {
        name.to_string()
    } else {
        format!("column_{}", pos + 1)
    }
}

/// Parameter names fall back to the placeholder number when no column name
/// was bound.
pub(crate) fn param_name(number: u32, column_name: &str) -> String {
    if !column_name.is_empty() {
        arg_name(column_name)
    } else {
        format!("dollar_{}", number)
    }
}

/// Sanitize an enum value label into identifier characters.
pub(crate) fn enum_replace(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Singularize a table name for its model struct. Deliberately small; names
/// the rules miss can be pinned with the exclusion list.
pub(crate) fn singular(name: &str, exclusions: &[String]) -> String {
    if exclusions.iter().any(|e| e.eq_ignore_ascii_case(name)) {
        return name.to_string();
    }
    let lower = name.to_lowercase();
    if lower.len() > 3 && lower.ends_with("ies") {
        return format!("{}y", &name[..name.len() - 3]);
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if lower.len() > suffix.len() && lower.ends_with(suffix) {
            return name[..name.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

fn split_parts(name: &str) -> impl Iterator<Item = &str> {
    name.split(|c: char| c == '_' || c == '-').filter(|p| !p.is_empty())
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_name() {
        assert_eq!(struct_name("accounts"), "Accounts");
        assert_eq!(struct_name("user_id"), "UserID");
        assert_eq!(struct_name("id"), "ID");
        assert_eq!(struct_name("value_0"), "Value0");
    }

    #[test]
    fn test_arg_name() {
        assert_eq!(arg_name("id"), "id");
        assert_eq!(arg_name("user_id"), "userID");
        assert_eq!(arg_name("created_at"), "createdAt");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("AuthUser"), "auth_user");
        assert_eq!(snake_case("UserID"), "user_id");
    }

    #[test]
    fn test_column_name_fallback() {
        assert_eq!(column_name("email", 3), "email");
        assert_eq!(column_name("", 0), "column_1");
    }

    #[test]
    fn test_param_name_fallback() {
        assert_eq!(param_name(2, "user_id"), "userID");
        assert_eq!(param_name(2, ""), "dollar_2");
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("accounts", &[]), "account");
        assert_eq!(singular("categories", &[]), "category");
        assert_eq!(singular("statuses", &[]), "status");
        assert_eq!(singular("address", &[]), "address");
        let excl = vec!["series".to_string()];
        assert_eq!(singular("series", &excl), "series");
    }

    #[test]
    fn test_enum_replace() {
        assert_eq!(enum_replace("in-progress"), "in_progress");
        assert_eq!(enum_replace("a b:c"), "a_b_c");
    }
}
