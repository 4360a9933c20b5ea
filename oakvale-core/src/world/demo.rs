//! Fixed demo content: the village of Oakvale and its inhabitants

use tracing::info;

use super::{Item, Location, Position, Terrain, World, WorldMap};
use crate::character::{Character, CharacterClass, CharacterId, CharacterRace, Personality, Stats};
use crate::config::OakvaleConfig;
use crate::error::Result;
use crate::memory::{EventKind, WorldEvent};

pub const MAP_WIDTH: i32 = 30;
pub const MAP_HEIGHT: i32 = 20;

fn personality(traits: &[&str], likes: &[&str], dislikes: &[&str]) -> Personality {
    let owned = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
    Personality {
        traits: owned(traits),
        likes: owned(likes),
        dislikes: owned(dislikes),
        emotion: None,
    }
}

fn village_map() -> WorldMap {
    let mut map = WorldMap::new(MAP_WIDTH, MAP_HEIGHT);
    // Forest ring around the village
    map.fill(Terrain::Forest, 5, 0, 20, 5);
    map.fill(Terrain::Forest, 5, 15, 20, 5);
    map.fill(Terrain::Forest, 5, 5, 5, 10);
    map.fill(Terrain::Forest, 20, 5, 5, 10);
    map.fill(Terrain::Water, 0, 10, 30, 2);
    map.fill(Terrain::Road, 0, 7, 30, 1);
    map.fill(Terrain::Building, 12, 6, 2, 2);
    map.fill(Terrain::Building, 16, 6, 2, 2);
    map.fill(Terrain::Building, 12, 10, 2, 2);
    map.fill(Terrain::Building, 16, 10, 2, 2);
    map.fill(Terrain::Mountain, 25, 0, 5, 5);
    map.fill(Terrain::Cave, 27, 3, 1, 1);
    map
}

fn locations() -> Vec<Location> {
    vec![
        Location::new(
            "Oakvale Village",
            "A small peaceful village surrounded by forests",
            10,
            5,
            10,
            10,
        ),
        Location::new("Oakvale Tavern", "A cozy tavern with a warm hearth", 12, 6, 2, 2),
        Location::new(
            "Durgan's Forge",
            "A busy blacksmith shop with the sound of hammering",
            16,
            6,
            2,
            2,
        ),
        Location::new("General Store", "A shop with various goods and supplies", 12, 10, 2, 2),
        Location::new(
            "Temple of Light",
            "A small temple dedicated to the gods of light",
            16,
            10,
            2,
            2,
        )
        .with_shrine(),
        Location::new("Misty Mountains", "Tall mountains shrouded in mist", 25, 0, 5, 5),
        Location::new(
            "Dark Cave",
            "A mysterious cave entrance in the mountainside",
            27,
            3,
            1,
            1,
        ),
    ]
}

fn characters(config: &OakvaleConfig) -> Vec<Character> {
    let capacity = config.memory.max_character_memories;

    let player = Character::new(
        CharacterId::player(),
        "Player",
        CharacterClass::Warrior,
        CharacterRace::Human,
        1,
    )
    .with_memory_capacity(capacity)
    .with_stats(Stats::new(14, 12, 14, 10, 10, 12))
    .with_max_hp(20)
    .with_position(Position::new(15, 5))
    .with_item(Item::weapon("sword", 2))
    .with_item(Item::armor("shield", 1))
    .with_item(Item::consumable("potion", 10))
    .with_gold(50)
    .with_description("A brave adventurer")
    .with_goal("Explore the world")
    .with_goal("Find adventure");

    let mut goren = Character::new(
        "tavernkeeper_01",
        "Goren",
        CharacterClass::Merchant,
        CharacterRace::Human,
        3,
    )
    .with_memory_capacity(capacity)
    .with_stats(Stats::new(12, 10, 14, 12, 14, 16))
    .with_max_hp(20)
    .with_position(Position::new(13, 8))
    .with_item(Item::consumable("ale", 2))
    .with_item(Item::consumable("mead", 2))
    .with_item(Item::consumable("bread", 4))
    .with_gold(100)
    .with_description("A jovial tavern keeper with a hearty laugh")
    .with_personality(personality(
        &["friendly", "gregarious", "opportunistic"],
        &["gold", "stories", "ale"],
        &["thieves", "troublemakers"],
    ))
    .with_goal("Make a profit")
    .with_goal("Keep customers happy")
    .with_goal("Gather interesting stories");
    goren.add_memory(0, "Served a group of adventurers who talked about a dragon in the mountains", 3);
    goren.add_memory(0, "Heard rumors of bandits on the east road", 2);
    goren.add_memory(0, "There's a troll that has been causing trouble for travelers", 3);

    let mut durgan = Character::new(
        "blacksmith_01",
        "Durgan",
        CharacterClass::Merchant,
        CharacterRace::Dwarf,
        5,
    )
    .with_memory_capacity(capacity)
    .with_stats(Stats::new(16, 14, 16, 12, 12, 10))
    .with_max_hp(30)
    .with_position(Position::new(17, 8))
    .with_item(Item::weapon("sword", 2))
    .with_item(Item::armor("shield", 1))
    .with_item(Item::armor("armor", 2))
    .with_gold(200)
    .with_description("A stout dwarf with muscular arms and a thick beard")
    .with_personality(personality(
        &["hardworking", "honest", "gruff"],
        &["craftsmanship", "ale", "honesty"],
        &["haggling", "shoddy work", "elves"],
    ))
    .with_goal("Craft masterwork items")
    .with_goal("Earn enough to expand the forge");
    durgan.modify_relationship(&"tavernkeeper_01".into(), 60);
    durgan.add_memory(0, "A strange traveler commissioned an unusual silver blade", 3);
    durgan.add_memory(0, "The mines in the mountains have gone quiet", 2);
    durgan.add_memory(0, "I've been making stronger weapons since the troll attacks started", 2);

    let mut melody = Character::new(
        "minstrel_01",
        "Melody",
        CharacterClass::Bard,
        CharacterRace::Human,
        2,
    )
    .with_memory_capacity(capacity)
    .with_stats(Stats::new(8, 14, 10, 12, 10, 16))
    .with_max_hp(15)
    .with_position(Position::new(15, 8))
    .with_item(Item::trinket("lute", 15))
    .with_item(Item::trinket("flute", 8))
    .with_item(Item::consumable("wine", 2))
    .with_gold(30)
    .with_description("A cheerful young woman with a beautiful voice and colorful clothes")
    .with_personality(personality(
        &["cheerful", "curious", "flirtatious"],
        &["music", "stories", "attractive people"],
        &["silence", "boredom", "violence"],
    ))
    .with_goal("Collect stories for songs")
    .with_goal("Earn fame")
    .with_goal("Find romance");
    melody.modify_relationship(&"tavernkeeper_01".into(), 50);
    melody.modify_relationship(&"blacksmith_01".into(), 30);
    melody.add_memory(0, "Heard a haunting melody from the forest at night", 3);
    melody.add_memory(0, "A noble from the capital is supposedly traveling incognito", 2);
    melody.add_memory(0, "I'm composing a song about a fearsome troll terrorizing the countryside", 2);

    let mut karim = Character::new("guard_01", "Karim", CharacterClass::Guard, CharacterRace::Human, 3)
        .with_memory_capacity(capacity)
        .with_stats(Stats::new(14, 12, 14, 10, 12, 10))
        .with_max_hp(25)
        .with_position(Position::new(10, 7))
        .with_item(Item::weapon("sword", 2))
        .with_item(Item::armor("shield", 1))
        .with_item(Item::consumable("jerky", 3))
        .with_gold(15)
        .with_description("A stern-looking guard with a weathered face")
        .with_personality(personality(
            &["dutiful", "suspicious", "brave"],
            &["order", "discipline", "recognition"],
            &["troublemakers", "monsters", "laziness"],
        ))
        .with_goal("Protect the village")
        .with_goal("Advance in rank")
        .with_goal("Hunt down the troll brigand");
    karim.modify_relationship(&"tavernkeeper_01".into(), 40);
    karim.modify_relationship(&"blacksmith_01".into(), 60);
    karim.modify_relationship(&"minstrel_01".into(), 20);
    karim.add_memory(0, "Spotted strange lights in the mountains three nights ago", 3);
    karim.add_memory(0, "Merchants reported missing goods on the east road", 2);
    karim.add_memory(0, "I've been ordered to organize a hunt for the troll that's been attacking travelers", 3);

    let mut gorkash = Character::new(
        "troll_brigand_01",
        "Gorkash",
        CharacterClass::Monster,
        CharacterRace::Orc,
        5,
    )
    .with_memory_capacity(capacity)
    .with_stats(Stats::new(18, 10, 16, 8, 8, 6))
    .with_max_hp(40)
    .with_position(Position::new(25, 8))
    .with_item(Item::weapon("crude axe", 3))
    .with_item(Item::armor("tattered armor", 1))
    .with_item(Item::trinket("stolen jewelry", 40))
    .with_gold(50)
    .with_description("A massive troll with greenish skin and a menacing grin, wielding a crude axe")
    .with_personality(personality(
        &["aggressive", "greedy", "territorial"],
        &["gold", "food", "fighting"],
        &["knights", "villagers", "being outnumbered"],
    ))
    .with_goal("Rob travelers on the road")
    .with_goal("Collect valuable items")
    .with_goal("Establish dominance in the area");
    gorkash.modify_relationship(&"tavernkeeper_01".into(), -60);
    gorkash.modify_relationship(&"blacksmith_01".into(), -70);
    gorkash.modify_relationship(&"guard_01".into(), -80);
    gorkash.add_memory(0, "I ambushed a merchant caravan last week and got some shiny things", 3);
    gorkash.add_memory(0, "Villagers tried to drive me away with torches and pitchforks", 2);
    gorkash.add_memory(0, "I've been watching the road for easy prey", 1);

    vec![player, goren, durgan, melody, karim, gorkash]
}

/// Build the Oakvale demo world
pub fn oakvale_village(config: &OakvaleConfig) -> Result<World> {
    let mut world = World::new(village_map(), config);
    for location in locations() {
        world.add_location(location);
    }
    for character in characters(config) {
        world.add_character(character)?;
    }
    world.drop_item(Position::new(14, 13), Item::consumable("healing herb", 6));

    world.record(WorldEvent::new(
        0,
        EventKind::Arrival,
        CharacterId::player(),
        "You arrive at the outskirts of Oakvale Village.",
    ));

    info!(
        "Demo world created with {} characters",
        world.characters().count()
    );
    Ok(world)
}
