//! Training data sources: local CSV files or CSV served over http(s).

use super::{EstimatorError, Flight};

pub const REQUIRED_COLUMNS: [&str; 5] = ["OPERA", "TIPOVUELO", "MES", "Fecha-O", "Fecha-I"];

pub fn is_remote(source: &str) -> bool { source.starts_with("http://") || source.starts_with("https://") }

pub async fn read_source(client: &reqwest::Client, source: &str) -> Result<Vec<Flight>, EstimatorError> {
    let unreadable = |reason: String| EstimatorError::SourceUnreadable { location: source.to_string(), reason };
    let text = if is_remote(source) {
        let resp = client.get(source).send().await.map_err(|e| unreadable(e.to_string()))?;
        let resp = resp.error_for_status().map_err(|e| unreadable(e.to_string()))?;
        resp.text().await.map_err(|e| unreadable(e.to_string()))?
    } else {
        tokio::fs::read_to_string(source).await.map_err(|e| unreadable(e.to_string()))?
    };
    parse_csv(&text)
}

/// Header-indexed CSV parse. Extra columns are ignored; quoted fields may
/// contain commas and doubled quotes but not line breaks.
pub fn parse_csv(text: &str) -> Result<Vec<Flight>, EstimatorError> {
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r')).filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| EstimatorError::SchemaMismatch("data source is empty".into()))?;
    let header = split_record(header.trim_start_matches('\u{feff}'));
    let mut idx = [0usize; 5];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = header.iter().position(|h| h.trim() == name)
            .ok_or_else(|| EstimatorError::SchemaMismatch(format!("missing column {name}")))?;
    }
    let [opera, tipo, mes, fecha_o, fecha_i] = idx;

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        let fields = split_record(line);
        let field = |i: usize| fields.get(i).map(|f| f.trim().to_string())
            .ok_or_else(|| EstimatorError::SchemaMismatch(format!("row {} has {} fields", n + 1, fields.len())));
        let month = field(mes)?.parse::<u8>().ok().filter(|m| (1..=12).contains(m))
            .ok_or_else(|| EstimatorError::SchemaMismatch(format!("row {}: MES is not a month", n + 1)))?;
        rows.push(Flight::new(field(opera)?, field(tipo)?, month).with_times(field(fecha_i)?, field(fecha_o)?));
    }
    if rows.is_empty() { return Err(EstimatorError::SchemaMismatch("data source has no rows".into())); }
    Ok(rows)
}

fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => { field.push('"'); chars.next(); }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Fecha-I,Vlo-I,MES,OPERA,TIPOVUELO,Fecha-O\r\n\
2017-01-01 23:30:00,226,1,\"Grupo LATAM\",I,2017-01-01 23:33:00\r\n\
2017-07-02 10:00:00,11,7,Sky Airline,N,2017-07-02 10:40:00\r\n";

    #[test]
    fn parses_rows_by_header_position() {
        let rows = parse_csv(SAMPLE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].opera, "Grupo LATAM");
        assert_eq!(rows[0].tipo_vuelo, "I");
        assert_eq!(rows[1].mes, 7);
        assert_eq!(rows[1].fecha_o.as_deref(), Some("2017-07-02 10:40:00"));
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let err = parse_csv("OPERA,MES\nGrupo LATAM,1\n").unwrap_err();
        assert!(matches!(err, EstimatorError::SchemaMismatch(ref m) if m.contains("TIPOVUELO")));
    }

    #[test]
    fn bad_month_and_empty_body() {
        let bad = "OPERA,TIPOVUELO,MES,Fecha-O,Fecha-I\nCopa Air,I,13,a,b\n";
        assert!(matches!(parse_csv(bad), Err(EstimatorError::SchemaMismatch(_))));
        let empty = "OPERA,TIPOVUELO,MES,Fecha-O,Fecha-I\n";
        assert!(matches!(parse_csv(empty), Err(EstimatorError::SchemaMismatch(_))));
    }

    #[test]
    fn quoted_fields_keep_commas() {
        assert_eq!(split_record(r#"a,"b, c","say ""hi""""#), vec!["a", "b, c", "say \"hi\""]);
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let err = read_source(&reqwest::Client::new(), "/definitely/not/here.csv").await.unwrap_err();
        assert!(matches!(err, EstimatorError::SourceUnreadable { .. }));
    }
}
