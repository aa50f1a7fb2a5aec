//! Image URL resolution.

use mass_core::constants::IMAGE_RESIZE_PROXY;
use mass_core::media::MediaItemImage;

/// Percent-encode `value`, leaving `/` intact.
fn quote(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}

/// URL a client can load `image` from.
///
/// - remotely accessible, `size == 0`: the path itself
/// - remotely accessible, sized: a resized thumbnail from the resize proxy
/// - anything else: the server's image proxy, which resolves the path through
///   the owning provider (the path is encoded twice)
pub fn image_url(image: &MediaItemImage, size: u32, base_url: &str) -> String {
    if image.remotely_accessible && size == 0 {
        return image.path.clone();
    }
    if image.remotely_accessible {
        return format!(
            "{IMAGE_RESIZE_PROXY}?url={}&w={size}&h={size}&fit=cover&a=attention",
            quote(&image.path)
        );
    }
    format!(
        "{}/imageproxy?path={}&provider={}&size={size}",
        base_url.trim_end_matches('/'),
        quote(&quote(&image.path)),
        image.provider
    )
}
