#[cfg(test)]
mod tests {
    use crate::schema::{
        Column, DataType, Record, SchemaError, Value, decode_record, encode_record, parse_date,
        record_size,
    };

    fn product_columns() -> Vec<Column> {
        let mut name = Column::new("name", DataType::Varchar);
        name.size = Some(10);
        vec![
            Column::new("id", DataType::Int),
            name,
            Column::new("price", DataType::Float),
            Column::new("since", DataType::Date),
        ]
    }

    fn sample_record() -> Record {
        let mut r = Record::new();
        r.insert("id".into(), Value::Int(1));
        r.insert("name".into(), Value::Str("espresso".into()));
        r.insert("price".into(), Value::Float(2.5));
        r.insert("since".into(), Value::Date(parse_date("2024-01-01").unwrap()));
        r
    }

    #[test]
    fn test_record_size_is_column_sum() {
        assert_eq!(record_size(&product_columns()), 4 + 10 + 4 + 8);
    }

    #[test]
    fn test_record_roundtrip() {
        let columns = product_columns();
        let record = sample_record();

        let bytes = encode_record(&columns, &record).unwrap();
        assert_eq!(bytes.len(), record_size(&columns));

        let back = decode_record(&columns, &bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_varchar_truncated_to_declared_size() {
        let columns = product_columns();
        let mut record = sample_record();
        record.insert("name".into(), Value::Str("a-name-longer-than-ten".into()));

        let bytes = encode_record(&columns, &record).unwrap();
        let back = decode_record(&columns, &bytes).unwrap();
        assert_eq!(back["name"], Value::Str("a-name-lon".into()));
    }

    #[test]
    fn test_record_missing_column_rejected() {
        let columns = product_columns();
        let mut record = sample_record();
        record.remove("price");

        let err = encode_record(&columns, &record).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidColumn { .. }));
    }

    #[test]
    fn test_record_null_columns_roundtrip() {
        let columns = product_columns();
        let mut record = sample_record();
        record.insert("price".into(), Value::Null);
        record.insert("since".into(), Value::Null);

        let bytes = encode_record(&columns, &record).unwrap();
        let back = decode_record(&columns, &bytes).unwrap();

        // FLOAT has no reserved null cell: zero bytes read back as 0.0.
        // DATE keeps the distinction: epoch 0 decodes to Null.
        assert_eq!(back["price"], Value::Float(0.0));
        assert_eq!(back["since"], Value::Null);
    }

    #[test]
    fn test_record_layout_follows_declaration_order() {
        let columns = product_columns();
        let record = sample_record();
        let bytes = encode_record(&columns, &record).unwrap();

        // id at offset 0, name at 4, price at 14, since at 18.
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), 1);
        assert_eq!(&bytes[4..12], b"espresso");
        assert_eq!(
            f32::from_le_bytes(bytes[14..18].try_into().unwrap()),
            2.5
        );
    }
}
