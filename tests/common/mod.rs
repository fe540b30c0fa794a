use cardindex::Config;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A data directory seeded with every network-backed input, so runs stay offline.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

fn write(path: &Path, value: &Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn image(uri: &str) -> Value {
    json!({ "border_crop": uri, "normal": uri })
}

pub fn printing(id: &str, name: &str, set: &str, cn: &str, lang: &str) -> Value {
    json!({
        "id": id,
        "oracle_id": format!("oracle-{}", name),
        "name": name,
        "lang": lang,
        "set": set,
        "collector_number": cn,
        "rarity": "common",
        "mana_cost": "{R}",
        "type_line": "Instant",
        "layout": "normal",
        "released_at": "2021-01-01",
        "booster": true,
        "promo": false,
        "image_status": "highres_scan",
        "frame": "2015",
        "finishes": ["nonfoil", "foil"],
        "image_uris": image(&format!("{}.jpg", id)),
        "games": ["paper", "arena"]
    })
}

pub fn with(mut value: Value, changes: Value) -> Value {
    let target = value.as_object_mut().unwrap();
    for (k, v) in changes.as_object().unwrap() {
        if v.is_null() {
            target.remove(k);
        } else {
            target.insert(k.clone(), v.clone());
        }
    }
    value
}

pub fn catalog() -> Vec<Value> {
    let bolt = |id: &str, lang: &str, printed: Option<&str>| {
        let mut card = printing(id, "Lightning Bolt", "m21", "199", lang);
        if let Some(printed) = printed {
            card["printed_name"] = json!(printed);
        }
        card
    };
    let delver = |lang: &str, front: &str, back: &str| {
        with(
            printing(&format!("delver-{}", lang), "Delver of Secrets // Insectile Aberration", "isd", "51", lang),
            json!({
                "layout": "transform",
                "mana_cost": null,
                "image_uris": null,
                "type_line": "Creature — Human Wizard // Creature — Human Insect",
                "card_faces": [
                    {"name": "Delver of Secrets", "printed_name": front, "mana_cost": "{U}",
                     "type_line": "Creature — Human Wizard", "image_uris": image(&format!("delver-{}-front.jpg", lang))},
                    {"name": "Insectile Aberration", "printed_name": back, "mana_cost": "",
                     "type_line": "Creature — Human Insect", "image_uris": image(&format!("delver-{}-back.jpg", lang))}
                ]
            }),
        )
    };
    let forest = |cn: &str| {
        with(
            printing(&format!("forest-m21-{}", cn), "Forest", "m21", cn, "en"),
            json!({"mana_cost": "", "type_line": "Basic Land — Forest", "rarity": "common"}),
        )
    };

    vec![
        bolt("bolt-m21-en", "en", None),
        bolt("bolt-m21-fr", "fr", Some("Foudre")),
        bolt("bolt-m21-de", "de", Some("Blitzschlag")),
        with(
            printing("bolt-2xm-en", "Lightning Bolt", "2xm", "141", "en"),
            json!({"released_at": "2022-01-01", "promo": true, "rarity": "uncommon"}),
        ),
        delver("en", "Delver of Secrets", "Insectile Aberration"),
        delver("fr", "Fureteur des secrets", "Aberration insectile"),
        forest("274"),
        forest("273"),
        with(
            printing("island-m21-ja", "Island", "m21", "999", "ja"),
            json!({"printed_name": "島", "mana_cost": "", "type_line": "Basic Land — Island"}),
        ),
        with(
            printing("goblin-token", "Goblin", "m21", "T1", "en"),
            json!({"layout": "token", "type_line": "Token Creature — Goblin"}),
        ),
        with(
            printing("fire-ice", "Fire // Ice", "mh2", "290", "en"),
            json!({"layout": "split", "mana_cost": "{1}{R} // {1}{U}", "type_line": "Instant // Instant", "rarity": "uncommon"}),
        ),
        with(
            printing("glory-akh-en", "Glorybringer", "akh", "122", "en"),
            json!({"released_at": "2017-04-28", "rarity": "rare", "mana_cost": "{3}{R}{R}", "type_line": "Creature — Dragon"}),
        ),
        with(
            printing("glory-akr-en", "Glorybringer", "akr", "150", "en"),
            json!({"released_at": "2020-08-13", "rarity": "rare", "mana_cost": "{3}{R}{R}", "type_line": "Creature — Dragon"}),
        ),
        with(
            printing("bolt-plst-m21", "Lightning Bolt", "plst", "M21-199", "en"),
            json!({"rarity": "uncommon"}),
        ),
    ]
}

fn sets() -> Value {
    let set = |code: &str, name: &str, set_type: &str| json!({"code": code, "name": name, "set_type": set_type});
    json!({
        "object": "list",
        "data": [
            set("m21", "Core Set 2021", "core"),
            set("2xm", "Double Masters", "masters"),
            set("isd", "Innistrad", "expansion"),
            set("mh2", "Modern Horizons 2", "draft_innovation"),
            set("akh", "Amonkhet", "expansion"),
            set("akr", "Amonkhet Remastered", "alchemy"),
        ]
    })
}

fn client_db() -> Value {
    let card = |grp: u32, title: u32, set: &str, cn: &str, rarity: u8| {
        json!({"grpId": grp, "titleId": title, "expansionCode": set, "collectorNumber": cn,
               "rarity": rarity, "isPrimaryCard": true})
    };
    json!({
        "localizations": {"enUS": {
            "1": "Lightning Bolt",
            "2": "Glorybringer",
            "3": "Forest",
            "4": "Fire /// Ice",
            "5": "Davriel's Withering"
        }},
        "cards": [
            card(70001, 1, "M21", "199", 2),
            card(80001, 2, "AKR", "150", 4),
            card(70002, 3, "M21", "274", 1),
            card(90001, 4, "MH2", "290", 3),
            card(95001, 5, "J21", "17", 1),
            {"grpId": 99999, "titleId": 1, "expansionCode": "M21", "collectorNumber": "199", "rarity": 2, "isPrimaryCard": false}
        ]
    })
}

fn mana_symbols() -> Value {
    let generic = |n: u32| (format!("{{{}}}", n), json!({"cmc": n as f64, "colors": []}));
    let colored = |c: &str| (format!("{{{}}}", c), json!({"cmc": 1.0, "colors": [c]}));
    let entries: serde_json::Map<String, Value> = (0..10)
        .map(generic)
        .chain(["W", "U", "B", "R", "G"].into_iter().map(colored))
        .collect();
    Value::Object(entries)
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let output = dir.path().join("out");

        let bulk: Value = Value::Array(catalog());
        write(&data.join("scryfall-all-cards.json"), &bulk);
        write(&data.join("scryfall-sets.json"), &sets());
        write(&data.join("client.json"), &client_db());
        write(&data.join("ratings_base.json"), &json!({"Lightning Bolt": 4.0, "Fire": 3.0}));
        write(&output.join("mana_symbols.json"), &mana_symbols());
        std::fs::create_dir_all(data.join("JumpstartBoosters")).unwrap();
        std::fs::write(
            data.join("JumpstartBoosters").join("burn.txt"),
            "Burn (1)\n2 Lightning Bolt\n1 Bolt Alias\n1 Unknown Card\n",
        )
        .unwrap();
        write(&data.join("JumpstartSwaps.json"), &json!({"Bolt Alias": "Lightning Bolt"}));

        let config = Config {
            data_dir: data.clone(),
            output_dir: output,
            client_db_json: Some(data.join("client.json")),
            icon_dir: dir.path().join("public"),
            api_base: "http://127.0.0.1:9/".into(),
            shard_count: 3,
            ..Config::default()
        };
        Fixture { dir, config }
    }

    pub fn data(&self, file: &str) -> PathBuf {
        self.config.data_path(file)
    }

    pub fn output(&self, file: &str) -> PathBuf {
        self.config.output_path(file)
    }

    pub fn read(&self, path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    /// Every shard merged into one `id -> card` object.
    pub fn all_cards(&self) -> serde_json::Map<String, Value> {
        let mut all = serde_json::Map::new();
        for i in cardindex::cache::shard_indexes(&self.config.data_dir).unwrap() {
            let shard = self.read(&self.data(&format!("MTGCards.{}.json", i)));
            for (id, card) in shard.as_object().unwrap() {
                assert!(all.insert(id.clone(), card.clone()).is_none(), "{} in two shards", id);
            }
        }
        all
    }
}

/// Serves `body` as JSON to every request on a local port; returns the base url.
pub fn serve_json(body: Value) -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let body = body.to_string();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            // Skip the request line and headers.
            while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
        }
    });
    format!("http://127.0.0.1:{}/", port)
}
