//! Human-readable dashboard titles.

/// Keyword sets scanned against the joined column names, in priority order.
const DOMAIN_SUFFIXES: &[(&[&str], &str)] = &[
    (&["sale", "revenue", "price", "amount", "cost"], "Sales Analytics"),
    (&["employee", "salary", "department", "hr"], "HR Analytics"),
    (&["customer", "user", "client"], "Customer Analytics"),
    (&["product", "inventory", "stock"], "Product Analytics"),
    (&["date", "time", "month", "year"], "Time Series Analysis"),
];

/// Build a dashboard title from the uploaded file name and its columns.
///
/// The extension is stripped, `_` and `-` become spaces, and each word is
/// title-cased. The first keyword set matching any column name picks a
/// `" - <Domain>"` suffix; otherwise `" Dashboard"` is appended.
///
/// ```rust
/// use docviz_core::tabular::naming::dashboard_name;
///
/// let cols = vec!["Employee".to_string(), "Salary".to_string()];
/// assert_eq!(dashboard_name("staff_list-2024.csv", &cols), "Staff List 2024 - HR Analytics");
/// ```
pub fn dashboard_name(filename: &str, columns: &[String]) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let base = title_case(&stem.replace(|c: char| c == '_' || c == '-', " "));

    let haystack = columns.join(" ").to_lowercase();
    for (keywords, suffix) in DOMAIN_SUFFIXES {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return format!("{} - {}", base, suffix);
        }
    }
    format!("{} Dashboard", base)
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("monthly REPORT"), "Monthly Report");
        assert_eq!(title_case("q3 numbers"), "Q3 Numbers");
        assert_eq!(title_case("2024report"), "2024Report");
    }

    #[test]
    fn test_suffix_priority() {
        // Both "price" and "customer" appear; the sales set comes first.
        let name = dashboard_name("orders.csv", &cols(&["customer_id", "price"]));
        assert_eq!(name, "Orders - Sales Analytics");
    }

    #[test]
    fn test_each_domain() {
        assert_eq!(
            dashboard_name("a.csv", &cols(&["Department"])),
            "A - HR Analytics"
        );
        assert_eq!(
            dashboard_name("a.csv", &cols(&["client"])),
            "A - Customer Analytics"
        );
        assert_eq!(
            dashboard_name("a.csv", &cols(&["stock_level"])),
            "A - Product Analytics"
        );
        assert_eq!(
            dashboard_name("a.csv", &cols(&["Month"])),
            "A - Time Series Analysis"
        );
    }

    #[test]
    fn test_default_suffix() {
        assert_eq!(
            dashboard_name("weather-log.json", &cols(&["temp", "wind"])),
            "Weather Log Dashboard"
        );
    }

    #[test]
    fn test_only_last_extension_stripped() {
        assert_eq!(
            dashboard_name("backup.2024.csv", &cols(&["x"])),
            "Backup.2024 Dashboard"
        );
        assert_eq!(dashboard_name("README", &cols(&["x"])), "Readme Dashboard");
    }
}
