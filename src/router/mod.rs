//! HTTP Router
//!
//! Parses incoming requests and routes them to appropriate handlers.
//! The surface is deliberately tiny: a form page, one upload endpoint
//! and a health check.

use thiserror::Error;

/// Router errors
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
}

/// Supported routes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// GET /
    FormPage,
    /// POST /single-file
    SingleFile,
    /// GET /health
    Health,
}

/// Request parser
pub struct RequestParser;

impl RequestParser {
    /// Parse an HTTP request line into a route
    pub fn parse(method: &str, path: &str) -> Result<Route, RouterError> {
        match path {
            "/" => match method {
                "GET" => Ok(Route::FormPage),
                m => Err(RouterError::MethodNotAllowed(m.into())),
            },
            "/single-file" => match method {
                "POST" => Ok(Route::SingleFile),
                m => Err(RouterError::MethodNotAllowed(m.into())),
            },
            "/health" => match method {
                "GET" => Ok(Route::Health),
                m => Err(RouterError::MethodNotAllowed(m.into())),
            },
            p => Err(RouterError::NotFound(p.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form_page() {
        let route = RequestParser::parse("GET", "/").unwrap();
        assert_eq!(route, Route::FormPage);
    }

    #[test]
    fn test_parse_single_file() {
        let route = RequestParser::parse("POST", "/single-file").unwrap();
        assert_eq!(route, Route::SingleFile);
    }

    #[test]
    fn test_parse_health() {
        let route = RequestParser::parse("GET", "/health").unwrap();
        assert_eq!(route, Route::Health);
    }

    #[test]
    fn test_parse_unknown_path() {
        let result = RequestParser::parse("GET", "/does-not-exist");
        assert!(matches!(result, Err(RouterError::NotFound(_))));
    }

    #[test]
    fn test_parse_wrong_method() {
        let result = RequestParser::parse("GET", "/single-file");
        assert!(matches!(result, Err(RouterError::MethodNotAllowed(_))));

        let result = RequestParser::parse("DELETE", "/");
        assert!(matches!(result, Err(RouterError::MethodNotAllowed(_))));
    }
}
