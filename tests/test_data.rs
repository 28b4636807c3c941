/// Feed documents shared by the integration tests.
#[allow(dead_code)]
pub const ANN_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
    <channel>
        <title>Anime News Network</title>
        <link>https://www.animenewsnetwork.com/</link>
        <description>The internet's most trusted anime news source</description>
        <lastBuildDate>Sat, 16 Mar 2024 12:00:00 GMT</lastBuildDate>

        <item>
            <media:title>Frieren key visual</media:title>
            <title>Frieren Anime Gets 2nd Season</title>
            <link>https://www.animenewsnetwork.com/news/2024-03-16/frieren-season-2</link>
            <description><![CDATA[<p>The <strong>Frieren: Beyond Journey's End</strong> anime is getting a second season.</p>]]></description>
            <pubDate>Sat, 16 Mar 2024 10:00:00 GMT</pubDate>
        </item>

        <item>
            <title>Dungeon Meshi Tops Weekly Ranking</title>
            <link>https://www.animenewsnetwork.com/news/2024-03-15/dungeon-meshi-ranking</link>
            <description>Delicious in Dungeon holds the top spot for the third week.</description>
            <pubDate>Fri, 15 Mar 2024 08:30:00 -0400</pubDate>
        </item>

        <item>
            <title>Solo Leveling Finale Date Announced</title>
            <link>https://www.animenewsnetwork.com/news/2024-03-14/solo-leveling-finale</link>
            <description>The first season wraps up at the end of the month.</description>
            <pubDate>Thu, 14 Mar 2024 06:00:00 PST</pubDate>
        </item>
    </channel>
</rss>"#;

#[allow(dead_code)]
pub const CRUNCHYROLL_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Crunchyroll News</title>
    <link href="https://www.crunchyroll.com/news"/>
    <updated>2024-03-16T12:00:00Z</updated>
    <id>https://www.crunchyroll.com/news</id>

    <entry>
        <title>Kaiju No. 8 Premiere Set for April</title>
        <link rel="alternate" href="https://www.crunchyroll.com/news/kaiju-no-8-premiere"/>
        <id>urn:cr:kaiju-8</id>
        <published>2024-03-16T11:00:00Z</published>
        <summary type="html">&lt;p&gt;Production I.G and Studio Khara team up.&lt;/p&gt;</summary>
    </entry>

    <entry>
        <title>Spring 2024 Simulcast Lineup</title>
        <link rel="alternate" href="https://www.crunchyroll.com/news/spring-2024-lineup"/>
        <id>urn:cr:spring-2024</id>
        <updated>2024-03-15T09:15:30.250+09:00</updated>
        <content type="html">&lt;ul&gt;&lt;li&gt;Kaiju No. 8&lt;/li&gt;&lt;li&gt;Wind Breaker&lt;/li&gt;&lt;/ul&gt;</content>
    </entry>
</feed>"#;

/// One good item, one without a link, one without a title.
#[allow(dead_code)]
pub const PARTIAL_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
    <channel>
        <title>Partial</title>
        <item>
            <title>Only Good Entry</title>
            <link>https://partial.example/good</link>
        </item>
        <item>
            <title>No Link Here</title>
            <description>Dropped</description>
        </item>
        <item>
            <link>https://partial.example/no-title</link>
        </item>
    </channel>
</rss>"#;

#[allow(dead_code)]
pub const NOT_A_FEED: &str = "<html><body><h1>503 Service Unavailable</h1></body></html>";

/// RSS document with `count` items, one hour apart, newest first.
#[allow(dead_code)]
pub fn generate_rss(source: &str, count: usize) -> String {
    let mut items = String::new();
    let base = chrono::DateTime::parse_from_rfc3339("2024-03-16T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);

    for i in 0..count {
        let published = base - chrono::Duration::hours(i as i64);
        items.push_str(&format!(
            r#"
        <item>
            <title>{source} story {i}</title>
            <link>https://{host}.example/news/{i}</link>
            <description>&lt;p&gt;Story number {i} from {source}.&lt;/p&gt;</description>
            <pubDate>{date}</pubDate>
        </item>"#,
            source = source,
            host = source.to_lowercase().replace(' ', "-"),
            i = i,
            date = published.to_rfc2822(),
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>{}</title>
        <link>https://example.com</link>{}
    </channel>
</rss>"#,
        source, items
    )
}
