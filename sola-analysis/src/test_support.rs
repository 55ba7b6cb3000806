use crate::document::DocumentSnapshot;
use lsp_types::Url;
use sola_syntax::SolaParser;
use std::sync::OnceLock;

const SAMPLE_SOURCE: &str = r#"namespace app.models

use sola.collections.List
use "helpers"

/** Something that can be stored. */
interface Storable {
    function key(): string;
}

enum Status: string {
    case Active = "active";
    case Banned = "banned";
}

/** A registered user. */
class User implements Storable {
    const MAX_NAME = 64;

    public $name: string;
    private $status: Status = Status::Active;

    public function __construct(string $name) {
        $this->name = $name;
    }

    public function key(): string {
        return "user:" . $this->name;
    }

    public function rename(string $name, bool $notify = false): User {
        $old := $this->name;
        $this->name = $name;
        if ($notify) {
            println("renamed " . $old);
        }
        return $this;
    }
}

// region helpers
function greet(User $user): string {
    $greeting := "Hello, " . $user->name;
    return $greeting;
}
// endregion

$users := [new User("ada"), new User("bob")];
foreach ($users as $i => $u) {
    print(greet($u));
}
"#;

struct SampleFixture {
    snapshot: DocumentSnapshot,
}

static SAMPLE_FIXTURE: OnceLock<SampleFixture> = OnceLock::new();

fn sample_fixture() -> &'static SampleFixture {
    SAMPLE_FIXTURE.get_or_init(|| SampleFixture {
        snapshot: snapshot("file:///workspace/app/user.sola", SAMPLE_SOURCE),
    })
}

/// A parsed snapshot of `text` at `uri`.
pub fn snapshot(uri: &str, text: &str) -> DocumentSnapshot {
    let uri = Url::parse(uri).expect("test uri must be valid");
    DocumentSnapshot::from_text(uri, text, &SolaParser)
}

pub fn sample_snapshot() -> DocumentSnapshot {
    sample_fixture().snapshot.clone()
}

pub fn sample_source() -> &'static str {
    SAMPLE_SOURCE
}
