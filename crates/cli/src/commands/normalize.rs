//! Address normalization command.

use std::path::Path;

use tillpoint_checkout::address::normalize_address;
use tillpoint_core::{Address, Country};

use super::{print_json, read_yaml};

/// Normalize the address in `address_path` and print it as JSON.
///
/// Without a countries file region ids cannot be resolved and are left as
/// they are.
///
/// # Errors
///
/// Returns an error if a file is missing or does not hold valid YAML.
pub async fn print(
    address_path: &Path,
    countries_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let address: Address = read_yaml(address_path).await?;
    let countries: Vec<Country> = match countries_path {
        Some(path) => read_yaml(path).await?,
        None => Vec::new(),
    };

    print_json(&normalize_address(&address, &countries))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tillpoint_core::RegionValue;

    use super::*;

    #[tokio::test]
    async fn test_reads_address_and_countries_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let address_path = dir.path().join("address.yaml");
        let countries_path = dir.path().join("countries.yaml");

        tokio::fs::write(
            &address_path,
            "firstname: Ada\nlastname: Lovelace\nstreet: [\"1 Main St\\nSuite 4\"]\ncity: Los Angeles\npostcode: '90001'\ntelephone: '555'\ncountry_id: US\nregion_id: 5\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            &countries_path,
            "- id: US\n  available_regions:\n    - { id: 5, code: CA, name: California }\n",
        )
        .await
        .unwrap();

        let address: Address = read_yaml(&address_path).await.unwrap();
        let countries: Vec<Country> = read_yaml(&countries_path).await.unwrap();
        let normalized = normalize_address(&address, &countries);

        assert_eq!(normalized.street, vec!["1 Main St", "Suite 4"]);
        assert_eq!(normalized.region, Some(RegionValue::Name("CA".to_string())));
        assert_eq!(normalized.country_code.as_deref(), Some("US"));
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let err = read_yaml::<Address>(Path::new("/nonexistent/address.yaml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
