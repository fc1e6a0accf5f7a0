use std::collections::BTreeMap;

pub const LOCALE_PARAM: &str = "image_request[locale]";
pub const IMAGE_PARAM: &str = "image_request[image]";
pub const REMOTE_IMAGE_URL_PARAM: &str = "image_request[remote_image_url]";

/// Optional `image_request[...]` form parameters sent with a submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    params: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw parameter. Bare names are wrapped as `image_request[name]`.
    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(wrap_param(name), value.into());
        self
    }

    pub fn locale(self, locale: &str) -> Self {
        self.param("locale", locale)
    }

    pub fn language(self, language: &str) -> Self {
        self.param("language", language)
    }

    pub fn device_id(self, device_id: &str) -> Self {
        self.param("device_id", device_id)
    }

    /// Seconds CloudSight may spend on the request before timing out.
    pub fn ttl(self, seconds: u32) -> Self {
        self.param("ttl", seconds.to_string())
    }

    pub fn location(self, latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        let options = self
            .param("latitude", latitude.to_string())
            .param("longitude", longitude.to_string());
        match altitude {
            Some(altitude) => options.param("altitude", altitude.to_string()),
            None => options,
        }
    }

    /// Point of interest in the image, as fractions of width and height.
    pub fn focus(self, x: f64, y: f64) -> Self {
        self.param("image_request[focus][x]", x.to_string())
            .param("image_request[focus][y]", y.to_string())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(&wrap_param(name)).map(String::as_str)
    }

    /// Parameters exactly as the caller set them, without defaults.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Form fields for a submission, with `default_locale` filled in when the
    /// caller did not choose one.
    pub fn to_form(&self, default_locale: &str) -> BTreeMap<String, String> {
        let mut form = self.params.clone();
        form.entry(LOCALE_PARAM.to_string())
            .or_insert_with(|| default_locale.to_string());
        form
    }
}

fn wrap_param(name: &str) -> String {
    if name.starts_with("image_request[") {
        name.to_string()
    } else {
        format!("image_request[{}]", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locale_is_added() {
        let form = RequestOptions::new().language("de").to_form("en-US");
        assert_eq!(form.get(LOCALE_PARAM).map(String::as_str), Some("en-US"));
        assert_eq!(form.get("image_request[language]").map(String::as_str), Some("de"));
        assert!(!RequestOptions::new().to_form("en-US").is_empty());
        assert!(RequestOptions::new().params().is_empty());
    }

    #[test]
    fn test_caller_locale_wins() {
        let options = RequestOptions::new().locale("fr-FR");
        let form = options.to_form("en-US");
        assert_eq!(form.get(LOCALE_PARAM).map(String::as_str), Some("fr-FR"));
        // to_form leaves the options untouched
        assert_eq!(options.get("locale"), Some("fr-FR"));
        assert_eq!(options.params().len(), 1);
        assert_eq!(options, RequestOptions::new().locale("fr-FR"));
    }

    #[test]
    fn test_nested_names_are_not_rewrapped() {
        let options = RequestOptions::new().focus(0.25, 0.5).location(52.52, 13.4, None);
        assert_eq!(options.get("image_request[focus][x]"), Some("0.25"));
        assert_eq!(options.get("image_request[focus][y]"), Some("0.5"));
        assert_eq!(options.get("latitude"), Some("52.52"));
        assert_eq!(options.get("altitude"), None);
    }
}
