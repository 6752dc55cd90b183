use electrobun_common::{Rect, ViewId};
use serde::{Deserialize, Serialize};

/// What a view displays. Loading one kind replaces the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContentSource {
    Url(String),
    Html(String),
}

impl ContentSource {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Html(_) => None,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Html(html) => Some(html),
            Self::Url(_) => None,
        }
    }
}

impl Default for ContentSource {
    fn default() -> Self {
        Self::Url("about:blank".to_string())
    }
}

/// Options for creating a view.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub content: ContentSource,
    /// Position and size within the host window.
    pub frame: Rect,
    /// Parent view, for nested views.
    pub host_view_id: Option<ViewId>,
    /// Follow the host window's size.
    pub auto_resize: bool,
    /// Attach to this native window right after creation.
    pub window_id: Option<u32>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            content: ContentSource::default(),
            frame: Rect::new(0.0, 0.0, 800.0, 600.0),
            host_view_id: None,
            auto_resize: true,
            window_id: None,
        }
    }
}

impl ViewOptions {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            content: ContentSource::Url(url.into()),
            ..Default::default()
        }
    }

    pub fn with_html(html: impl Into<String>) -> Self {
        Self {
            content: ContentSource::Html(html.into()),
            ..Default::default()
        }
    }

    pub fn frame(mut self, frame: Rect) -> Self {
        self.frame = frame;
        self
    }

    pub fn host_view(mut self, id: ViewId) -> Self {
        self.host_view_id = Some(id);
        self
    }

    pub fn auto_resize(mut self, enabled: bool) -> Self {
        self.auto_resize = enabled;
        self
    }

    pub fn window(mut self, window_id: u32) -> Self {
        self.window_id = Some(window_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = ViewOptions::default();
        assert_eq!(opts.content, ContentSource::Url("about:blank".into()));
        assert_eq!(opts.frame, Rect::new(0.0, 0.0, 800.0, 600.0));
        assert!(opts.auto_resize);
        assert!(opts.host_view_id.is_none());
        assert!(opts.window_id.is_none());
    }

    #[test]
    fn with_html_sets_only_html() {
        let opts = ViewOptions::with_html("<p>hi</p>").host_view(ViewId(2)).window(9);
        assert_eq!(opts.content.html(), Some("<p>hi</p>"));
        assert_eq!(opts.content.url(), None);
        assert_eq!(opts.host_view_id, Some(ViewId(2)));
        assert_eq!(opts.window_id, Some(9));
    }

    #[test]
    fn content_source_wire_shape() {
        let json = serde_json::to_value(ContentSource::Url("https://a.b".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "url", "value": "https://a.b"}));
    }
}
