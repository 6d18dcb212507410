use serde::Deserialize;

const SUCCESS_STATUS: &str = "Success";

/// A post office branch as returned by the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostOffice {
    name: String,
    /// branches of the same area share a code, so this is not always the queried one
    pincode: String,
    district: String,
    state: String,
}

impl PostOffice {
    #[cfg(test)]
    pub fn new(
        name: impl Into<String>,
        pincode: impl Into<String>,
        district: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pincode: pincode.into(),
            district: district.into(),
            state: state.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pincode(&self) -> &str {
        &self.pincode
    }

    pub fn district(&self) -> &str {
        &self.district
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}

/// One entry of the directory's response array
///
/// A failed lookup comes back as a normal `200` with a non-`Success` status
/// and `PostOffice: null`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryResponse {
    status: String,
    message: Option<String>,
    post_office: Option<Vec<PostOffice>>,
}

impl DirectoryResponse {
    #[cfg(test)]
    pub fn new(status: impl Into<String>, post_offices: Option<Vec<PostOffice>>) -> Self {
        Self {
            status: status.into(),
            message: None,
            post_office: post_offices,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    pub fn into_post_offices(self) -> Vec<PostOffice> {
        self.post_office.unwrap_or_default()
    }
}
