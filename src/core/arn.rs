//! Amazon Resource Name parsing.
//!
//! Shape only: `arn:<partition>:<service>:<region>:<account>:<resource>`.
//! Whether the named resource exists is for the deployment engine to find out.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:(aws|aws-cn|aws-us-gov):([a-z0-9-]+):([a-z0-9-]*):([0-9]{12}|aws)?:(.+)$")
        .expect("ARN pattern compiles")
});

/// A parsed ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    /// Twelve-digit account, `aws` for AWS-owned resources, or empty
    pub account: String,
    pub resource: String,
}

impl Arn {
    /// Resource type prefix (`image` in `image/amazon-linux-2-x86/x.x.x`).
    pub fn resource_type(&self) -> &str {
        self.resource
            .split_once(['/', ':'])
            .map(|(t, _)| t)
            .unwrap_or(&self.resource)
    }

    pub fn is_aws_owned(&self) -> bool {
        self.account == "aws"
    }
}

impl FromStr for Arn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ARN_RE
            .captures(s)
            .ok_or_else(|| format!("malformed ARN '{}'", s))?;
        let field = |i: usize| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
        Ok(Self {
            partition: field(1),
            service: field(2),
            region: field(3),
            account: field(4),
            resource: field(5),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imagebuilder_image() {
        let arn: Arn = "arn:aws:imagebuilder:us-west-2:aws:image/amazon-linux-2-x86/x.x.x"
            .parse()
            .unwrap();
        assert_eq!(arn.partition, "aws");
        assert_eq!(arn.service, "imagebuilder");
        assert_eq!(arn.region, "us-west-2");
        assert!(arn.is_aws_owned());
        assert_eq!(arn.resource_type(), "image");
    }

    #[test]
    fn test_parse_component_trailing_slash() {
        let arn: Arn =
            "arn:aws:imagebuilder:us-west-2:aws:component/amazon-linux-2-base-amazon-linux-2/"
                .parse()
                .unwrap();
        assert_eq!(arn.resource_type(), "component");
    }

    #[test]
    fn test_parse_global_iam() {
        let arn: Arn = "arn:aws:iam::aws:policy/AmazonS3FullAccess".parse().unwrap();
        assert_eq!(arn.region, "");
        assert_eq!(arn.resource_type(), "policy");
    }

    #[test]
    fn test_parse_account_owned() {
        let arn: Arn = "arn:aws-cn:imagebuilder:cn-north-1:123456789012:component/x/1.0.0/1"
            .parse()
            .unwrap();
        assert_eq!(arn.partition, "aws-cn");
        assert_eq!(arn.account, "123456789012");
        assert!(!arn.is_aws_owned());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "ami-0123456789abcdef0",
            "arn:aws:imagebuilder:us-west-2",
            "arn:gcp:imagebuilder:us-west-2:aws:image/x",
            "arn:aws:imagebuilder:us-west-2:12345:image/x",
            "arn:aws:imagebuilder:us-west-2:aws:",
        ] {
            assert!(bad.parse::<Arn>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let s = "arn:aws:imagebuilder:eu-west-1:aws:image/amazon-linux-2-x86/x.x.x";
        assert_eq!(s.parse::<Arn>().unwrap().to_string(), s);
    }
}
