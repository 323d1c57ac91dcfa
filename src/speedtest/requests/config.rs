use crate::speedtest::requests::Request;
use crate::speedtest::ClientInfo;
use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::fmt::Formatter;
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

/// Client configuration as seen by speedtest.net (public IP, ISP, location).
///
/// The endpoint answers with an XML document; only the attributes of its
/// `<client .../>` element are of interest.
pub(crate) struct ConfigRequest {}

impl Request for ConfigRequest {
    type Body = Vec<u8>;

    type Response = ClientInfo;

    fn endpoint(&self) -> Cow<'_, str> {
        "/speedtest-config.php".into()
    }
}

impl<'de> Deserialize<'de> for ClientInfo {
    fn deserialize<D>(deserializer: D) -> Result<ClientInfo, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(ClientInfoVisitor)
    }
}

struct ClientInfoVisitor;

impl<'de> Visitor<'de> for ClientInfoVisitor {
    type Value = ClientInfo;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a speedtest configuration document")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        let mut reader = EventReader::from_str(v);

        loop {
            match reader.next().map_err(E::custom)? {
                XmlEvent::StartElement { name, attributes, .. }
                    if name.local_name == "client" =>
                {
                    return Ok(client_info(&attributes));
                }
                XmlEvent::EndDocument => {
                    return Err(E::custom("missing <client> element"));
                }
                _ => {}
            }
        }
    }
}

fn client_info(attributes: &[OwnedAttribute]) -> ClientInfo {
    let attribute = |key: &str| {
        attributes
            .iter()
            .find(|attribute| attribute.name.local_name == key)
            .map(|attribute| attribute.value.clone())
            .unwrap_or_default()
    };

    ClientInfo {
        ip: attribute("ip"),
        isp: attribute("isp"),
        country: attribute("country"),
        lat: attribute("lat").parse().ok(),
        lon: attribute("lon").parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<settings>
<client ip="203.0.113.7" lat="40.7128" lon="-74.0060"
  isp="AT&amp;T Internet" isprating="3.7" rating="0" ispdlavg="0"
  ispulavg="0" loggedin="0" country="US" />
<server-config threadcount="4" ignoreids="" notonmap="" forcepingid="" preferredserverid=""/>
</settings>"#;

    #[test]
    fn test_client_element_is_parsed() {
        let info: ClientInfo = serde_plain::from_str(CONFIG).unwrap();

        assert_eq!(info.ip, "203.0.113.7");
        assert_eq!(info.isp, "AT&T Internet");
        assert_eq!(info.country, "US");
        assert_eq!(info.lat, Some(40.7128));
        assert_eq!(info.lon, Some(-74.006));
    }

    #[test]
    fn test_missing_client_element_is_an_error() {
        let result: Result<ClientInfo, _> =
            serde_plain::from_str("<settings><server-config/></settings>");
        assert!(result.is_err());
    }

    #[test]
    fn test_attributes_of_following_elements_are_ignored() {
        let info: ClientInfo = serde_plain::from_str(
            r#"<settings><client isp="Example"/><server-config country="XX"/></settings>"#,
        )
        .unwrap();
        assert_eq!(info.isp, "Example");
        assert_eq!(info.country, "");
        assert_eq!(info.lat, None);
    }

    #[test]
    fn test_config_document_is_not_json() {
        assert!(serde_json::from_str::<ClientInfo>(CONFIG).is_err());
    }

    #[test]
    fn test_numeric_character_references_are_decoded() {
        let info: ClientInfo = serde_plain::from_str(
            r#"<settings><client isp="O&#39;Brien Telecom" country="IE"/></settings>"#,
        )
        .unwrap();

        assert_eq!(info.isp, "O'Brien Telecom");
        assert_eq!(info.country, "IE");
    }

    #[test]
    fn test_single_quoted_attributes_are_read() {
        let info: ClientInfo = serde_plain::from_str(
            "<settings><client ip='192.0.2.1' isp='ExampleISP'/></settings>",
        )
        .unwrap();

        assert_eq!(info.ip, "192.0.2.1");
        assert_eq!(info.isp, "ExampleISP");
    }

    #[test]
    fn test_attributes_may_start_on_a_new_line() {
        let info: ClientInfo = serde_plain::from_str(
            "<settings><client\n    ip=\"192.0.2.1\"\n    isp=\"ExampleISP\"/></settings>",
        )
        .unwrap();

        assert_eq!(info.ip, "192.0.2.1");
        assert_eq!(info.isp, "ExampleISP");
    }

    #[test]
    fn test_angle_bracket_inside_value_keeps_later_attributes() {
        let info: ClientInfo = serde_plain::from_str(
            r#"<settings><client isp="A>B Networks" country="US"/></settings>"#,
        )
        .unwrap();

        assert_eq!(info.isp, "A>B Networks");
        assert_eq!(info.country, "US");
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let result: Result<ClientInfo, _> =
            serde_plain::from_str("<settings><server-config></settings>");
        assert!(result.is_err());
    }
}
