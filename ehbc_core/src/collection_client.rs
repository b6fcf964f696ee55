//! This client searches an address on the East Herts e-forms service and reads a collection date.

use reqwest::{Client, Url};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::LookupError;

pub static CALENDARS_URL: &str = "https://www.eastherts.gov.uk/calendars";
pub static SEARCH_URL: &str = "https://e-services.eastherts.gov.uk/eforms450/ufsajax";

static TOKEN_PARAM: &str = "ebz";
static RESULTS_IDENTIFIER: &str = "CTID-17-_-LAYOUT";

// The hidden form of the search page, the server rejects submissions deviating from it.
static FIELD_TOKEN: &str = "ebs";
static FIELD_HOUSE_NUMBER: &str = "CTRL:15:_:A";
static FIELD_POSTCODE: &str = "CTRL:14:_:A";
static FIELD_INPUTS: &str = "HID:inputs";
static FIELD_SEARCH: &str = "CTRL:16:_";
static HIDDEN_INPUTS: &str = "ICTRL:15:_:A,ICTRL:14:_:A,ACTRL:16:_,APAGE:E.h,APAGE:B.h,APAGE:N.h";
static SEARCH: &str = "Search";

/// The kind of collection to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Refuse,
    Recycling,
    Organic,
}

impl CollectionType {
    pub const ALL: [CollectionType; 3] = [
        CollectionType::Refuse,
        CollectionType::Recycling,
        CollectionType::Organic,
    ];

    /// The id of the element holding this collection's date in the results.
    pub fn element_id(self) -> &'static str {
        match self {
            CollectionType::Refuse => "CTID-19-_-A",
            CollectionType::Recycling => "CTID-20-_-A",
            CollectionType::Organic => "CTID-41-_-A",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CollectionType::Refuse => "refuse",
            CollectionType::Recycling => "recycling",
            CollectionType::Organic => "organic",
        }
    }
}

/// The address to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    house_number: String,
    postcode: String,
}

impl LookupRequest {
    /// Build a request, rejecting addresses the search form can never match.
    ///
    /// The postcode is case sensitive and must include the space, e.g. `SG13 8AA`.
    pub fn new(
        house_number: impl Into<String>,
        postcode: impl Into<String>,
    ) -> Result<Self, LookupError> {
        let house_number = house_number.into();
        let postcode = postcode.into();
        if house_number.trim().is_empty() {
            return Err(LookupError::InvalidRequest(String::from(
                "the house number must not be empty",
            )));
        }
        if !postcode.trim().contains(char::is_whitespace) {
            return Err(LookupError::InvalidRequest(format!(
                "the postcode {postcode:?} must include a space"
            )));
        }
        Ok(Self {
            house_number,
            postcode,
        })
    }

    pub fn house_number(&self) -> &str {
        &self.house_number
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }
}

/// Where the landing page and the search endpoint live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub calendars_url: String,
    pub search_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            calendars_url: String::from(CALENDARS_URL),
            search_url: String::from(SEARCH_URL),
        }
    }
}

/// A cookie carrying client used for exactly one lookup.
///
/// [`Session::search`] consumes the session, so cookies never leak into another lookup.
#[derive(Debug)]
pub struct Session {
    client: Client,
    endpoints: Endpoints,
}

impl Session {
    pub fn new(endpoints: Endpoints) -> Result<Self, LookupError> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self { client, endpoints })
    }

    /// Follow the landing page's redirect and read the form token off the final URL.
    pub async fn form_token(&self) -> Result<String, LookupError> {
        let response = self
            .client
            .get(&self.endpoints.calendars_url)
            .send()
            .await?
            .error_for_status()?;
        debug!(url = %response.url(), "resolved landing page");
        token_from_url(response.url())
    }

    /// Submit the search form and return the HTML of the results panel.
    pub async fn search(self, token: &str, request: &LookupRequest) -> Result<String, LookupError> {
        let response = self
            .client
            .post(&self.endpoints.search_url)
            .query(&[(TOKEN_PARAM, token)])
            .form(&[
                (FIELD_TOKEN, token),
                (FIELD_HOUSE_NUMBER, request.house_number()),
                (FIELD_POSTCODE, request.postcode()),
                (FIELD_INPUTS, HIDDEN_INPUTS),
                (FIELD_SEARCH, SEARCH),
            ])
            .send()
            .await?
            .error_for_status()?;
        results_fragment(&response.text().await?)
    }
}

/// Look up a collection date on the live East Herts site.
pub async fn lookup(
    request: &LookupRequest,
    collection_type: CollectionType,
) -> Result<String, LookupError> {
    lookup_with(&Endpoints::default(), request, collection_type).await
}

/// Look up a collection date against the given endpoints.
pub async fn lookup_with(
    endpoints: &Endpoints,
    request: &LookupRequest,
    collection_type: CollectionType,
) -> Result<String, LookupError> {
    info!(
        house_number = request.house_number(),
        postcode = request.postcode(),
        collection_type = collection_type.label(),
        "looking up collection date"
    );
    let session = Session::new(endpoints.clone())?;
    let token = session.form_token().await?;
    let fragment = session.search(&token, request).await?;
    extract(&fragment, collection_type)
}

/// Read the form token from a query string. Blank values count as missing.
fn token_from_url(url: &Url) -> Result<String, LookupError> {
    url.query_pairs()
        .find(|(key, value)| key == TOKEN_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| LookupError::TokenMissing {
            url: url.to_string(),
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    updated_controls: Vec<UpdatedControl>,
}

/// A region of the search page re-rendered by the server.
#[derive(Debug, Deserialize)]
struct UpdatedControl {
    identifier: String,
    #[serde(default)]
    html: String,
}

/// Pick the results panel out of the search response.
fn results_fragment(body: &str) -> Result<String, LookupError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    debug!(
        count = response.updated_controls.len(),
        "received updated controls"
    );
    response
        .updated_controls
        .into_iter()
        .find(|control| control.identifier == RESULTS_IDENTIFIER)
        .map(|control| control.html)
        .ok_or(LookupError::ResultsNotFound)
}

/// Read the text of the requested collection's element from the results panel.
pub fn extract(html: &str, collection_type: CollectionType) -> Result<String, LookupError> {
    let id = collection_type.element_id();
    let selector = Selector::parse(&format!("[id=\"{id}\"]"))
        .map_err(|err| LookupError::InvalidSelector(format!("{err:?}")))?;
    let fragment = Html::parse_fragment(html);
    let text = fragment
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>());
    text.ok_or(LookupError::MissingElement { id })
}

#[cfg(test)]
mod tests {
    use reqwest::Url;
    use wiremock::{
        matchers::{body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::{
        collection_client::{
            extract, lookup, lookup_with, results_fragment, token_from_url, CollectionType,
            Endpoints, LookupRequest, Session,
        },
        error::LookupError,
    };

    static SINGLE_REFUSE: &str = r#"{"updatedControls":[{"identifier":"CTID-17-_-LAYOUT","html":"<div id=\"CTID-19-_-A\">Monday 5 June</div>"}]}"#;

    fn request() -> LookupRequest {
        LookupRequest::new("12", "SG13 8AA").unwrap()
    }

    /// Mount a landing page redirecting to the e-forms page with the given query string.
    async fn mount_landing_page(server: &MockServer, query: &str) {
        Mock::given(method("GET"))
            .and(path("/calendars"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                format!("{}/eforms450/eforms?{query}", server.uri()).as_str(),
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/eforms450/eforms"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "JSESSIONID=abc123; Path=/")
                    .set_body_string("<html></html>"),
            )
            .mount(server)
            .await;
    }

    fn endpoints(server: &MockServer) -> Endpoints {
        Endpoints {
            calendars_url: format!("{}/calendars", server.uri()),
            search_url: format!("{}/eforms450/ufsajax", server.uri()),
        }
    }

    #[test]
    fn test_token_from_url() {
        let url = Url::parse(
            "https://e-services.eastherts.gov.uk/eforms450/eforms?ebd=0&ebz=XYZ123",
        )
        .unwrap();
        assert_eq!(token_from_url(&url).unwrap(), "XYZ123");
    }

    #[test]
    fn test_token_from_url_missing() {
        for url in [
            "https://e-services.eastherts.gov.uk/eforms450/eforms?ebd=0",
            "https://e-services.eastherts.gov.uk/eforms450/eforms",
            "https://e-services.eastherts.gov.uk/eforms450/eforms?ebz=",
        ] {
            let url = Url::parse(url).unwrap();
            assert!(matches!(
                token_from_url(&url),
                Err(LookupError::TokenMissing { .. })
            ));
        }
    }

    #[test]
    fn test_lookup_request() {
        let request = request();
        assert_eq!(request.house_number(), "12");
        assert_eq!(request.postcode(), "SG13 8AA");
        assert!(matches!(
            LookupRequest::new("12", "SG138AA"),
            Err(LookupError::InvalidRequest(_))
        ));
        assert!(matches!(
            LookupRequest::new(" ", "SG13 8AA"),
            Err(LookupError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_extract() {
        let html = results_fragment(SINGLE_REFUSE).unwrap();
        assert_eq!(
            extract(&html, CollectionType::Refuse).unwrap(),
            "Monday 5 June"
        );
        assert!(matches!(
            extract(&html, CollectionType::Recycling),
            Err(LookupError::MissingElement { id: "CTID-20-_-A" })
        ));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let html = results_fragment(SINGLE_REFUSE).unwrap();
        let first = extract(&html, CollectionType::Refuse).unwrap();
        let second = extract(&html, CollectionType::Refuse).unwrap();
        assert_eq!(first, second);
    }

    /// Test whether a recorded search response is parsed correctly.
    ///
    /// This test is offline.
    #[test]
    fn test_results_fragment() {
        let body = include_str!("collection_client/tests/updated_controls.json");
        let html = results_fragment(body).unwrap();
        let dates: Vec<String> = CollectionType::ALL
            .into_iter()
            .map(|collection_type| extract(&html, collection_type).unwrap())
            .collect();
        assert_eq!(
            dates,
            vec![
                "Friday 23/06/2023",
                "Friday 30/06/2023",
                "Tuesday 27/06/2023",
            ]
        );
    }

    #[test]
    fn test_results_fragment_not_found() {
        assert!(matches!(
            results_fragment(r#"{"updatedControls":[]}"#),
            Err(LookupError::ResultsNotFound)
        ));
        assert!(matches!(
            results_fragment(
                r#"{"updatedControls":[{"identifier":"CTID-14-_-LAYOUT","html":"<p>Search</p>"}]}"#
            ),
            Err(LookupError::ResultsNotFound)
        ));
    }

    #[test]
    fn test_results_fragment_invalid() {
        assert!(matches!(
            results_fragment("<html>Service unavailable</html>"),
            Err(LookupError::InvalidResponse(_))
        ));
        assert!(matches!(
            results_fragment(r#"{"focusControl":"CTRL:15:_:A"}"#),
            Err(LookupError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_form_token() {
        let server = MockServer::start().await;
        mount_landing_page(&server, "ebd=0&ebz=XYZ123").await;
        let session = Session::new(endpoints(&server)).unwrap();
        assert_eq!(session.form_token().await.unwrap(), "XYZ123");
    }

    #[tokio::test]
    async fn test_form_token_missing() {
        let server = MockServer::start().await;
        mount_landing_page(&server, "ebd=0").await;
        let session = Session::new(endpoints(&server)).unwrap();
        assert!(matches!(
            session.form_token().await,
            Err(LookupError::TokenMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_with() {
        let server = MockServer::start().await;
        mount_landing_page(&server, "ebz=XYZ123").await;
        Mock::given(method("POST"))
            .and(path("/eforms450/ufsajax"))
            .and(query_param("ebz", "XYZ123"))
            .and(header("cookie", "JSESSIONID=abc123"))
            .and(body_string_contains("ebs=XYZ123"))
            .and(body_string_contains("CTRL%3A15%3A_%3AA=12"))
            .and(body_string_contains("CTRL%3A14%3A_%3AA=SG13+8AA"))
            .and(body_string_contains(
                "HID%3Ainputs=ICTRL%3A15%3A_%3AA%2CICTRL%3A14%3A_%3AA%2CACTRL%3A16%3A_%2CAPAGE%3AE.h%2CAPAGE%3AB.h%2CAPAGE%3AN.h",
            ))
            .and(body_string_contains("CTRL%3A16%3A_=Search"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                include_str!("collection_client/tests/updated_controls.json"),
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        let date = lookup_with(&endpoints(&server), &request(), CollectionType::Organic)
            .await
            .unwrap();
        assert_eq!(date, "Tuesday 27/06/2023");
    }

    #[tokio::test]
    async fn test_lookup_with_no_results() {
        let server = MockServer::start().await;
        mount_landing_page(&server, "ebz=XYZ123").await;
        Mock::given(method("POST"))
            .and(path("/eforms450/ufsajax"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"updatedControls":[]}"#, "application/json"),
            )
            .mount(&server)
            .await;
        let result = lookup_with(&endpoints(&server), &request(), CollectionType::Refuse).await;
        assert!(matches!(result, Err(LookupError::ResultsNotFound)));
    }

    #[tokio::test]
    async fn test_lookup_with_server_error() {
        let server = MockServer::start().await;
        mount_landing_page(&server, "ebz=XYZ123").await;
        Mock::given(method("POST"))
            .and(path("/eforms450/ufsajax"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let result = lookup_with(&endpoints(&server), &request(), CollectionType::Refuse).await;
        assert!(matches!(result, Err(LookupError::Transport(_))));
    }

    /// Test whether the live site still answers a lookup.
    ///
    /// This is an online test!
    #[tokio::test]
    #[ignore]
    async fn test_lookup() {
        let request = LookupRequest::new("1", "SG13 8EQ").unwrap();
        let date = lookup(&request, CollectionType::Refuse).await.unwrap();
        assert!(!date.is_empty());
    }
}
