/// Deterministic slug: lower-cased, spaces replaced by hyphens
///
/// Nothing else is normalized, so the same name always yields the same slug
/// across sync cycles.
///
/// ```
/// use catalog_sync::core::mapping::slugify;
///
/// assert_eq!(slugify("Occhiali da Sole"), "occhiali-da-sole");
/// ```
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Ray-Ban", "ray-ban" ; "already hyphenated")]
    #[test_case("Senza Categoria", "senza-categoria" ; "two words")]
    #[test_case("A  B", "a--b" ; "double space kept")]
    #[test_case("", "" ; "empty")]
    fn test_slugify(input: &str, expected: &str) {
        assert_eq!(slugify(input), expected);
    }
}
