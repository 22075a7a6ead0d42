//! Blank import templates.

use taxon_core::Result;

use crate::schema::EntityKind;

/// Header plus example rows for `kind`, delimited by `delimiter`.
pub fn template(kind: EntityKind, delimiter: u8) -> Result<String> {
    let schema = kind.schema();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(schema.header())?;
    for example in schema.examples {
        writer.write_record(example.iter())?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| taxon_core::Error::Internal(format!("template buffer: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| taxon_core::Error::Internal(format!("template encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_rows;

    #[test]
    fn test_templates_parse_back_cleanly() {
        for kind in EntityKind::ALL {
            let text = template(kind, b',').unwrap();
            let rows = parse_rows(&text, kind.schema(), b',').unwrap();
            assert_eq!(rows.len(), kind.schema().examples.len(), "{}", kind);
        }
    }

    #[test]
    fn test_template_quotes_json_cells() {
        let text = template(EntityKind::Concepts, b',').unwrap();
        assert!(text.starts_with("name,taxonomy_code,properties\n"));
        assert!(text.contains(r#""{""icd10"": ""I10"", ""chronic"": true}""#));
    }

    #[test]
    fn test_template_honours_delimiter() {
        let text = template(EntityKind::Regional, b'\t').unwrap();
        assert!(text.starts_with("region_code\tterm\tpronunciation\n"));
    }
}
