//! Distinguished name string assembly (RFC 4514)

/// One relative distinguished name: an attribute type with one or more values
struct Rdn<'a> {
    attribute: &'static str,
    values: Vec<&'a str>,
}

/// Escape an attribute value for inclusion in an RFC 4514 string
pub fn escape_attribute_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let escape = match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' => true,
            ' ' => i == 0 || i == last,
            '#' => i == 0,
            _ => false,
        };
        if escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builder for an RFC 4514 distinguished name
///
/// Attributes are emitted most-specific first (`CN` leading, `C` last), and
/// multiple values of the same attribute share one RDN joined with `+`.
#[derive(Default)]
pub struct DistinguishedNameBuilder<'a> {
    common_name: Option<&'a str>,
    country: Vec<&'a str>,
    organization: Vec<&'a str>,
    organizational_unit: Vec<&'a str>,
    locality: Vec<&'a str>,
    province: Vec<&'a str>,
    street_address: Vec<&'a str>,
    postal_code: Vec<&'a str>,
}

impl<'a> DistinguishedNameBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn common_name(mut self, cn: Option<&'a str>) -> Self {
        self.common_name = cn.filter(|s| !s.is_empty());
        self
    }

    pub fn country(mut self, values: &'a [String]) -> Self {
        self.country = values.iter().map(String::as_str).collect();
        self
    }

    pub fn organization(mut self, values: &'a [String]) -> Self {
        self.organization = values.iter().map(String::as_str).collect();
        self
    }

    pub fn organizational_unit(mut self, values: &'a [String]) -> Self {
        self.organizational_unit = values.iter().map(String::as_str).collect();
        self
    }

    pub fn locality(mut self, values: &'a [String]) -> Self {
        self.locality = values.iter().map(String::as_str).collect();
        self
    }

    pub fn province(mut self, values: &'a [String]) -> Self {
        self.province = values.iter().map(String::as_str).collect();
        self
    }

    pub fn street_address(mut self, values: &'a [String]) -> Self {
        self.street_address = values.iter().map(String::as_str).collect();
        self
    }

    pub fn postal_code(mut self, values: &'a [String]) -> Self {
        self.postal_code = values.iter().map(String::as_str).collect();
        self
    }

    /// Assemble the distinguished name string
    pub fn build(self) -> String {
        let rdns = [
            Rdn {
                attribute: "CN",
                values: self.common_name.into_iter().collect(),
            },
            Rdn {
                attribute: "POSTALCODE",
                values: self.postal_code,
            },
            Rdn {
                attribute: "STREET",
                values: self.street_address,
            },
            Rdn {
                attribute: "ST",
                values: self.province,
            },
            Rdn {
                attribute: "L",
                values: self.locality,
            },
            Rdn {
                attribute: "OU",
                values: self.organizational_unit,
            },
            Rdn {
                attribute: "O",
                values: self.organization,
            },
            Rdn {
                attribute: "C",
                values: self.country,
            },
        ];

        rdns.iter()
            .filter(|rdn| !rdn.values.is_empty())
            .map(|rdn| {
                rdn.values
                    .iter()
                    .map(|v| format!("{}={}", rdn.attribute, escape_attribute_value(v)))
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
