use ircord_core::{ChannelLink, ChannelRef};

/// The active set of channel links.
///
/// Replaced as a whole; lookups are by either side of a link. IRC channel
/// names compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: Vec<ChannelLink>,
}

impl LinkTable {
    pub fn new(links: Vec<ChannelLink>) -> Self {
        Self { links }
    }

    pub fn replace(&mut self, links: Vec<ChannelLink>) {
        self.links = links;
    }

    pub fn all(&self) -> &[ChannelLink] {
        &self.links
    }

    pub fn by_irc(&self, channel: &str) -> Option<&ChannelLink> {
        self.links
            .iter()
            .find(|l| l.irc.eq_ignore_ascii_case(channel))
    }

    pub fn by_discord(&self, channel_id: u64) -> Option<&ChannelLink> {
        self.links.iter().find(|l| l.discord == channel_id)
    }

    pub fn by_ref(&self, channel: &ChannelRef) -> Option<&ChannelLink> {
        match channel {
            ChannelRef::Irc(name) => self.by_irc(name),
            ChannelRef::Discord(id) => self.by_discord(*id),
        }
    }

    /// The channel on the other network linked to `channel`.
    pub fn peer_of(&self, channel: &ChannelRef) -> Option<ChannelRef> {
        let link = self.by_ref(channel)?;
        Some(match channel {
            ChannelRef::Irc(_) => ChannelRef::Discord(link.discord),
            ChannelRef::Discord(_) => ChannelRef::Irc(link.irc.clone()),
        })
    }

    /// Record the resolved name of a Discord channel.
    pub fn set_discord_name(&mut self, channel_id: u64, name: &str) -> bool {
        match self.links.iter_mut().find(|l| l.discord == channel_id) {
            Some(link) => {
                link.discord_name = Some(name.to_string());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LinkTable {
        LinkTable::new(vec![
            ChannelLink::new("#rust", 1),
            ChannelLink::new("#linux", 2).with_webhook("https://discord.com/api/webhooks/7/t"),
        ])
    }

    #[test]
    fn peers_resolve_both_ways() {
        let t = table();
        assert_eq!(
            t.peer_of(&ChannelRef::Irc("#Rust".into())),
            Some(ChannelRef::Discord(1))
        );
        assert_eq!(
            t.peer_of(&ChannelRef::Discord(2)),
            Some(ChannelRef::Irc("#linux".into()))
        );
        assert_eq!(t.peer_of(&ChannelRef::Discord(3)), None);
        assert_eq!(t.peer_of(&ChannelRef::Irc("#nope".into())), None);
    }

    #[test]
    fn replace_swaps_whole_set() {
        let mut t = table();
        t.replace(vec![ChannelLink::new("#new", 9)]);
        assert!(t.by_irc("#rust").is_none());
        assert_eq!(t.all().len(), 1);
    }

    #[test]
    fn discord_name_is_recorded() {
        let mut t = table();
        assert!(t.set_discord_name(2, "linux-talk"));
        assert!(!t.set_discord_name(5, "ghost"));
        assert_eq!(t.by_discord(2).unwrap().discord_label(), "linux-talk");
        assert_eq!(t.by_discord(1).unwrap().discord_label(), "1");
    }
}
