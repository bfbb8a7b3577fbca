use serde::{Deserialize, Serialize};

/// A SKU the tenant is subscribed to (`/subscribedSkus`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribedSku {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "skuId")]
    pub sku_id: String,
    #[serde(rename = "skuPartNumber", default)]
    pub sku_part_number: String,
    #[serde(rename = "capabilityStatus", default)]
    pub capability_status: Option<String>,
    #[serde(rename = "appliesTo", default)]
    pub applies_to: Option<String>,
    #[serde(rename = "consumedUnits", default)]
    pub consumed_units: i64,
    #[serde(rename = "prepaidUnits", default)]
    pub prepaid_units: PrepaidUnits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepaidUnits {
    #[serde(default)]
    pub enabled: i64,
    #[serde(default)]
    pub suspended: i64,
    #[serde(default)]
    pub warning: i64,
    #[serde(rename = "lockedOut", default)]
    pub locked_out: i64,
}

impl SubscribedSku {
    pub fn available_units(&self) -> i64 {
        (self.prepaid_units.enabled - self.consumed_units).max(0)
    }

    /// Consumed share of enabled units, 0-100. Free SKUs with no units report 0.
    pub fn utilization_percent(&self) -> f64 {
        if self.prepaid_units.enabled <= 0 {
            return 0.0;
        }
        self.consumed_units as f64 * 100.0 / self.prepaid_units.enabled as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_utilization() {
        let sku: SubscribedSku = serde_json::from_str(
            r#"{"skuId":"s","skuPartNumber":"ENTERPRISEPACK","consumedUnits":45,
                "prepaidUnits":{"enabled":50,"suspended":0,"warning":0}}"#,
        )
        .unwrap();
        assert_eq!(sku.available_units(), 5);
        assert!((sku.utilization_percent() - 90.0).abs() < f64::EPSILON);

        let free: SubscribedSku =
            serde_json::from_str(r#"{"skuId":"f","consumedUnits":3}"#).unwrap();
        assert_eq!(free.available_units(), 0);
        assert_eq!(free.utilization_percent(), 0.0);
    }
}
