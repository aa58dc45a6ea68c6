use ircord_format::chunk_discord;
use serenity::builder::ExecuteWebhook;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use serenity::model::webhook::Webhook;

/// Longest username Discord accepts for a webhook post.
pub const WEBHOOK_NAME_MAX: usize = 80;

/// Send `text` to `channel_id` in chunks Discord will accept.
pub async fn send_chunked(
    http: &Http,
    channel_id: ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    for chunk in chunk_discord(text).into_iter().filter(|c| !c.trim().is_empty()) {
        channel_id.say(http, chunk).await?;
    }
    Ok(())
}

/// Post `text` through `webhook` under `username`, chunked like [`send_chunked`].
pub async fn execute_chunked(
    http: &Http,
    webhook: &Webhook,
    username: &str,
    text: &str,
) -> Result<(), serenity::Error> {
    let username = webhook_name(username);
    for chunk in chunk_discord(text).into_iter().filter(|c| !c.trim().is_empty()) {
        let builder = ExecuteWebhook::new().content(chunk).username(username.clone());
        webhook.execute(http, false, builder).await?;
    }
    Ok(())
}

/// Trim a display name to what a webhook post may carry.
pub fn webhook_name(name: &str) -> String {
    let name = name.trim();
    match name.char_indices().nth(WEBHOOK_NAME_MAX) {
        Some((cut, _)) => name[..cut].to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through() {
        assert_eq!(webhook_name(" IRC user "), "IRC user");
    }

    #[test]
    fn long_names_are_cut_on_char_boundary() {
        let name = "é".repeat(100);
        let cut = webhook_name(&name);
        assert_eq!(cut.chars().count(), WEBHOOK_NAME_MAX);
    }
}
