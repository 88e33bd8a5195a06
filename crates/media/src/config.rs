/// Default API endpoint.
const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Credentials and endpoint for the media account.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API root without trailing slash; requests go to `{base_url}/{cloud_name}/...`.
    pub base_url: String,
}

impl CloudinaryConfig {
    /// Load the media account from environment variables.
    ///
    /// | Env Var                  | Required | Default                            |
    /// |--------------------------|----------|------------------------------------|
    /// | `CLOUDINARY_CLOUD_NAME`  | **yes**  | --                                 |
    /// | `CLOUDINARY_API_KEY`     | **yes**  | --                                 |
    /// | `CLOUDINARY_API_SECRET`  | **yes**  | --                                 |
    /// | `CLOUDINARY_BASE_URL`    | no       | `https://api.cloudinary.com/v1_1`  |
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or empty.
    pub fn from_env() -> Self {
        let required = |name: &str| {
            let value =
                std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set in the environment"));
            assert!(!value.is_empty(), "{name} must not be empty");
            value
        };

        let base_url = std::env::var("CLOUDINARY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        Self {
            cloud_name: required("CLOUDINARY_CLOUD_NAME"),
            api_key: required("CLOUDINARY_API_KEY"),
            api_secret: required("CLOUDINARY_API_SECRET"),
            base_url,
        }
    }

    /// Endpoint for `action` on assets of `resource` type.
    pub fn endpoint(&self, resource: &str, action: &str) -> String {
        format!("{}/{}/{resource}/{action}", self.base_url, self.cloud_name)
    }
}
