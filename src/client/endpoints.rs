use crate::config::RepositoryConfig;

/// URL builders for the repository REST API and its file and handle servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    bitstream_base_url: String,
    handle_base_url: String,
}

impl Endpoints {
    pub fn new(
        base_url: impl Into<String>,
        bitstream_base_url: impl Into<String>,
        handle_base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: trim(base_url.into()),
            bitstream_base_url: trim(bitstream_base_url.into()),
            handle_base_url: trim(handle_base_url.into()),
        }
    }

    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self::new(
            config.base_url.as_str(),
            config.bitstream_base_url.as_str(),
            config.handle_base_url.as_str(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn top_communities(&self) -> String {
        format!("{}/communities/top-communities", self.base_url)
    }

    pub fn sub_communities(&self, community_id: &str) -> String {
        format!("{}/communities/{community_id}/communities/?offset=-1", self.base_url)
    }

    pub fn community_collections(&self, community_id: &str) -> String {
        format!("{}/communities/{community_id}/collections/?offset=-1", self.base_url)
    }

    pub fn collection(&self, collection_id: &str) -> String {
        format!("{}/collections/{collection_id}", self.base_url)
    }

    pub fn collection_items(&self, collection_id: &str, offset: u64) -> String {
        format!("{}/collections/{collection_id}/items/?offset={offset}", self.base_url)
    }

    pub fn item(&self, item_id: &str) -> String {
        format!("{}/items/{item_id}", self.base_url)
    }

    pub fn item_metadata(&self, item_id: &str) -> String {
        format!("{}/items/{item_id}/metadata/", self.base_url)
    }

    /// First binary file of an item
    pub fn bitstream(&self, handle: &str, item_id: &str) -> String {
        format!(
            "{}/handle/{handle}/{item_id}?sequence=1",
            self.bitstream_base_url
        )
    }

    /// Public landing page of an item
    pub fn handle_url(&self, handle: &str) -> String {
        format!("{}/handle/{handle}", self.handle_base_url)
    }
}

fn trim(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::new(
            "https://repo.example/rest/",
            "https://repo.example/bitstream",
            "http://repo.example",
        )
    }

    #[test]
    fn test_rest_urls() {
        let e = endpoints();
        assert_eq!(e.top_communities(), "https://repo.example/rest/communities/top-communities");
        assert_eq!(
            e.sub_communities("4"),
            "https://repo.example/rest/communities/4/communities/?offset=-1"
        );
        assert_eq!(
            e.community_collections("4"),
            "https://repo.example/rest/communities/4/collections/?offset=-1"
        );
        assert_eq!(e.collection("9"), "https://repo.example/rest/collections/9");
        assert_eq!(
            e.collection_items("9", 200),
            "https://repo.example/rest/collections/9/items/?offset=200"
        );
        assert_eq!(e.item("123"), "https://repo.example/rest/items/123");
        assert_eq!(e.item_metadata("123"), "https://repo.example/rest/items/123/metadata/");
    }

    #[test]
    fn test_file_and_handle_urls() {
        let e = endpoints();
        assert_eq!(
            e.bitstream("20.500.12413/1234", "55"),
            "https://repo.example/bitstream/handle/20.500.12413/1234/55?sequence=1"
        );
        assert_eq!(
            e.handle_url("20.500.12413/1234"),
            "http://repo.example/handle/20.500.12413/1234"
        );
    }

    #[test]
    fn test_from_default_config() {
        let e = Endpoints::from_config(&RepositoryConfig::default());
        assert_eq!(e.base_url(), "https://opendocs.ids.ac.uk/rest");
    }
}
