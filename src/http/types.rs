//! Core HTTP protocol types: methods and status codes (§4.3, §4.9).

/// Methods this server dispatches on. Anything else is `Other` and produces a
/// `501 Not Implemented` response, per §4.3 step 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

impl Method {
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        }
    }
}

macro_rules! set_status_codes {
    ($($name:ident => $code:literal, $reason:literal;)*) => {
        /// The fixed set of status codes the response writer supports (§4.9).
        /// Unknown codes (there are none reachable through this server's handlers,
        /// but the table is kept total) render as `"Unknown status code"`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum StatusCode {
            $($name,)*
        }

        impl StatusCode {
            pub const fn code(self) -> u16 {
                match self { $(Self::$name => $code,)* }
            }

            pub const fn reason(self) -> &'static str {
                match self { $(Self::$name => $reason,)* }
            }
        }
    };
}

set_status_codes! {
    Ok => 200, "OK";
    BadRequest => 400, "Bad Request";
    NotFound => 404, "Not Found";
    InternalServerError => 500, "Internal Server Error";
    NotImplemented => 501, "Not Implemented";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_dispatch_table() {
        assert_eq!(Method::from_token("GET"), Method::Get);
        assert_eq!(Method::from_token("POST"), Method::Post);
        assert_eq!(Method::from_token("OPTIONS"), Method::Options);
        assert_eq!(Method::from_token("TRACE"), Method::Other);
        assert_eq!(Method::from_token(""), Method::Other);
    }

    #[test]
    fn status_reason_phrases() {
        assert_eq!(StatusCode::Ok.reason(), "OK");
        assert_eq!(StatusCode::NotFound.code(), 404);
    }
}
