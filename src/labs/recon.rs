//! Lab 01: passive reconnaissance, social-media OSINT and search dorking.

use super::{clear_rule, Difficulty, Flag, Lab, LabError, LabMeta, Profile};
use crate::console::rules::predicates::*;
use crate::console::{Command, Response, Rule, RuleTable};
use crate::missions::Step;

pub(super) const META: LabMeta = LabMeta {
    id: 1,
    slug: "lab01",
    title: "El-Taqassi",
    subtitle: "Passive Reconnaissance & Google Dorking",
    description: "Perform full passive OSINT on a target organization using terminal tools, \
                  social media intel, and search operators without touching the target.",
    difficulty: Difficulty::Beginner,
    points: 100,
    total_steps: 9,
    cwd: "~/recon",
};

const DEFAULT_DOMAIN: &str = "evilcorp.com";

const VOCABULARY: &[&str] = &[
    "help", "whoami", "pwd", "ls", "cat", "whois", "nslookup", "ping", "curl", "history",
    "clear", "ifconfig", "ip", "netstat", "traceroute", "dig",
];

const PROFILE: Profile = Profile {
    name: "Karim Nabil",
    headline: "IT Manager @ EvilCorp | CISSP | Network Security",
    posts: &[
        "Finally pushed the new firewall rules live on the EvilCorp internal network. \
         Long week but worth it. #CyberSecurity #SysAdmin",
        "Weekend mood: Lola literally sat on my keyboard for 3 hours straight and somehow \
         improved my uptime stats. Maybe she should be the IT Manager. #CatsOfLinkedIn",
        "Attended the Cairo InfoSec Summit last Tuesday. Great talks on zero-trust \
         architecture and supply-chain attacks. #InfoSec #ZeroTrust",
        "Hot take: users aren't the weakest link, bad UX design is. If a secure password is \
         annoying to use, people WILL write it on a sticky note. #PasswordSecurity",
        "Proud to share I've completed my CISSP certification! Shoutout to my cat Lola for \
         keeping me company during those 2am study sessions. #CISSP",
    ],
};

const FLAG: Flag = Flag {
    value: "FLAG{Omar_Badran_Recon_Master}",
    revealed_by: "admin-panel",
};

pub(super) fn build() -> Result<Lab, LabError> {
    let mut lab = Lab::assemble(META.id, rules(), steps(), VOCABULARY)?;
    lab.search = Some(search_engine());
    lab.profile = Some(PROFILE);
    lab.flag = Some(FLAG);
    Ok(lab)
}

fn steps() -> Vec<Step> {
    vec![
        Step::on_command(1, equals("whoami"))
            .title("Identify Yourself")
            .objective("Before anything else, confirm your identity and privileges.")
            .hint("whoami")
            .solution("whoami"),
        Step::on_command(2, cmd("whois"))
            .title("Domain Ownership")
            .objective("Query the public registry to learn who owns the target domain.")
            .hint("whois evilcorp.com")
            .solution("whois evilcorp.com"),
        Step::on_command(3, cmd("nslookup"))
            .title("DNS Resolution")
            .objective("Resolve the domain to its IP address and discover mail servers.")
            .hint("nslookup evilcorp.com")
            .solution("nslookup evilcorp.com"),
        Step::on_command(4, cmd("curl"))
            .title("HTTP Header Fingerprinting")
            .objective("Inspect HTTP response headers to identify the tech stack.")
            .hint("curl -I evilcorp.com")
            .solution("curl -I evilcorp.com"),
        Step::on_profile_answer(5, equals("lola"))
            .title("Social Media OSINT")
            .objective(
                "Browse the IT manager's profile. Find his pet's name: it's part of his password.",
            )
            .hint("Read Karim's posts carefully")
            .solution("Lola"),
        Step::on_search(
            6,
            any(vec![contains("admin"), contains("login")]).and_not(contains("site:evilcorp.com")),
        )
            .title("The Broad Search Trap")
            .objective("Search a generic term and see why it's useless for targeted recon.")
            .hint("admin")
            .solution("admin"),
        Step::on_search(7, contains("site:evilcorp.com").and_not(contains("inurl:admin")))
            .title("Site Operator")
            .objective("Use the site: operator to limit results to evilcorp.com only.")
            .hint("site:evilcorp.com")
            .solution("site:evilcorp.com"),
        Step::on_search(8, contains("site:evilcorp.com").and(contains("inurl:admin")))
            .title("Combined Dork")
            .objective("Combine site: and inurl: operators to locate the admin panel.")
            .hint("site:evilcorp.com inurl:admin")
            .solution("site:evilcorp.com inurl:admin"),
        Step::on_flag_captured(9)
            .title("Access & Capture Flag")
            .objective("Open the discovered admin panel link to capture the flag.")
            .hint("Capture the flag once the admin panel shows up in the results"),
    ]
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::fixed("help", cmd("help"), help()).example("help"),
        Rule::fixed(
            "whoami",
            cmd("whoami"),
            Response::lines(["student"]).with_note(
                "Before any operation, you must know your privilege level. \"student\" means a \
                 standard unprivileged user: you cannot read root-owned files or bind to ports \
                 below 1024.",
                "معرفة مين إنت ده أول حاجة.. مش زي ما تبدأ تعمل حاجة وانت مش عارف صلاحياتك",
            ),
        )
        .example("whoami"),
        Rule::fixed(
            "pwd",
            cmd("pwd"),
            Response::lines(["/home/student/recon"]).with_note(
                "Always confirm your working directory before running scripts or saving files.",
                "اعرف إنت فين الأول.. مش زي اللي بيتوه في المول",
            ),
        )
        .example("pwd"),
        Rule::render("ls", cmd("ls"), ls).example("ls -la"),
        Rule::render("cat", cmd("cat"), cat).example("cat scope.txt"),
        Rule::render("whois", cmd("whois"), whois).example("whois evilcorp.com"),
        Rule::render("nslookup", cmd("nslookup"), nslookup).example("nslookup evilcorp.com"),
        Rule::render("dig", cmd("dig"), dig).example("dig evilcorp.com"),
        Rule::render("ping", cmd("ping"), ping).example("ping evilcorp.com"),
        Rule::render("traceroute", cmd("traceroute"), traceroute).example("traceroute evilcorp.com"),
        Rule::render("curl", cmd("curl"), curl).example("curl -I evilcorp.com"),
        Rule::render("netstat", cmd("netstat"), netstat).example("netstat -tuln"),
        Rule::fixed(
            "ip-addr",
            cmd("ip").and(arg("addr")),
            Response::lines([
                "1: lo: <LOOPBACK,UP>",
                "   inet 127.0.0.1/8",
                "2: eth0: <BROADCAST,MULTICAST,UP>",
                "   inet 192.168.1.105/24 brd 192.168.1.255",
                "   inet6 fe80::1a2b:3c4d:5e6f:7a8b/64",
                "",
                "[!] Your IP: 192.168.1.105 (private, behind NAT)",
            ])
            .with_note(
                "Knowing your own IP is essential for setting up listeners in later phases. The \
                 private address means you're behind NAT.",
                "IP بتاعك مهم في الـ reverse shell.. بس لو ورا NAT محتاج relay",
            ),
        )
        .example("ip addr"),
        Rule::fixed(
            "ip-usage",
            cmd("ip"),
            Response::lines(["Usage: ip addr   (show network interfaces and addresses)"]),
        )
        .example("ip"),
        Rule::fixed(
            "ifconfig",
            cmd("ifconfig"),
            Response::lines([
                "eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>",
                "      inet 192.168.1.105  netmask 255.255.255.0  broadcast 192.168.1.255",
                "      inet6 fe80::1a2b:3c4d:5e6f:7a8b  prefixlen 64",
                "      ether aa:bb:cc:dd:ee:ff  txqueuelen 1000",
                "",
                "lo: flags=73<UP,LOOPBACK,RUNNING>",
                "      inet 127.0.0.1  netmask 255.0.0.0",
            ])
            .with_note_en(
                "ifconfig is the older interface command, replaced by `ip addr` on modern Linux.",
            ),
        )
        .example("ifconfig"),
        Rule::fixed(
            "history",
            cmd("history"),
            Response::lines([
                "    1  whoami",
                "    2  pwd",
                "    3  ls -la",
                "    4  cat recon_plan.txt",
                "    5  whois evilcorp.com",
                "    6  nslookup evilcorp.com",
                "    7  curl -I evilcorp.com",
                "    8  history",
            ])
            .with_note(
                "Bash saves every command in ~/.bash_history. Forensic analysts look there first.",
                "الـ history بيفضح! امسحه بعد كل engagement",
            ),
        )
        .example("history"),
        clear_rule(),
    ]
}

fn help() -> Response {
    Response::lines([
        "Cyber-Masry Recon Toolkit  -  Help Menu",
        "[SIMULATED ENVIRONMENT - EDUCATIONAL USE ONLY]",
        "",
        "  whoami                Print current user & role",
        "  pwd                   Print working directory",
        "  ls [-la]              List directory contents",
        "  cat <file>            Read a file",
        "  whois <domain>        Domain registration lookup",
        "  nslookup <domain>     DNS A/MX record lookup",
        "  dig <domain>          Detailed DNS enumeration",
        "  ping <host>           ICMP reachability check",
        "  curl -I <url>         Fetch HTTP response headers",
        "  traceroute <host>     Trace network path to host",
        "  netstat -tuln         Active network connections",
        "  ip addr               Show network interfaces",
        "  history               Show command history",
        "  clear                 Clear terminal",
        "",
        "  Mission steps 1-4 use this terminal. Start with:  whoami",
    ])
}

fn domain(cmd: &Command) -> &str {
    cmd.target().unwrap_or(DEFAULT_DOMAIN)
}

fn ls(cmd: &Command) -> Response {
    let detailed = cmd.flags.iter().any(|f| f.contains('l') || f.contains('a'));
    if !detailed {
        return Response::lines(["target_notes/  recon_plan.txt  scope.txt"]).with_note(
            "ls without flags hides dotfiles and permission details. Use `ls -la` during recon.",
            "جرب `ls -la` عشان تشوف المخفي",
        );
    }
    Response::lines([
        "total 28",
        "drwxr-xr-x  4 student student 4096 Feb 19 00:32 .",
        "drwxr-xr-x 18 student student 4096 Feb 19 00:30 ..",
        "-rw-------  1 student student  220 Feb 19 00:30 .bash_history",
        "-rw-r--r--  1 student student 3526 Feb 19 00:30 .bashrc",
        "drwxr-xr-x  2 student student 4096 Feb 19 00:32 target_notes/",
        "-rw-r--r--  1 student student  512 Feb 19 00:31 recon_plan.txt",
        "-rw-r--r--  1 student student  128 Feb 19 00:31 scope.txt",
        "-rw-------  1 root    root      64 Feb 19 00:00 flag.txt",
    ])
    .with_note(
        "\"-rw-------\" means only the owner can read or write. flag.txt is owned by root, so \
         reading it would need privilege escalation.",
        "flag.txt بتاعة root.. يعني محتاج privesc عشان تقراها",
    )
}

fn cat(cmd: &Command) -> Response {
    match cmd.target() {
        None => Response::lines(["cat: missing file operand", "Usage: cat <filename>"]).error(),
        Some("flag.txt") => Response::lines(["cat: flag.txt: Permission denied"])
            .with_note(
                "You are an unprivileged user. Go complete the search mission first!",
                "مش هتاخد الـ flag بالسهل! روح خلّص الـ Zoogle الأول",
            )
            .error(),
        Some("recon_plan.txt") => Response::lines([
            "# EvilCorp Recon Plan",
            "========================",
            "Target:   evilcorp.com",
            "Scope:    Web application + public IPs",
            "",
            "Step 1: Passive OSINT   -> whois, nslookup, dig",
            "Step 2: Search Dorks    -> site:, inurl:, filetype:",
            "Step 3: Header Analysis -> curl -I",
            "Step 4: Port Scanning   -> nmap (Lab 02)",
        ])
        .with_note_en("A structured recon plan prevents scope creep and keeps you organized."),
        Some("scope.txt") => Response::lines([
            "PENTEST SCOPE - EvilCorp",
            "========================",
            "IN SCOPE:",
            "  evilcorp.com       (web app)",
            "  203.0.113.42       (primary server IP)",
            "  203.0.113.43       (CDN edge IP)",
            "",
            "OUT OF SCOPE:",
            "  *.thirdparty.com",
            "  Internal network",
        ])
        .with_note(
            "Never hack without a defined scope and written authorization.",
            "من بره الـ scope = مشاكل قانونية.. حتى لو نيتك كانت كويسة",
        ),
        Some(file) => Response::lines([format!("cat: {}: No such file or directory", file)]).error(),
    }
}

fn whois(cmd: &Command) -> Response {
    let domain = domain(cmd);
    Response::lines([
        format!("   Domain Name: {}", domain.to_uppercase()),
        "   Registry Domain ID: D12345678-LROR".to_string(),
        "   Registrar: FakeRegistrar LLC".to_string(),
        "   Updated Date: 2024-11-15T08:30:00Z".to_string(),
        "   Creation Date: 2018-03-22T12:00:00Z".to_string(),
        "   Expiry Date: 2026-03-22T12:00:00Z".to_string(),
        "   Registrant Org: EvilCorp International Ltd.".to_string(),
        "   Registrant Country: US".to_string(),
        "   Name Server: ns1.evilcorp-dns.com".to_string(),
        "   Name Server: ns2.evilcorp-dns.com".to_string(),
        "   DNSSEC: unsigned".to_string(),
        String::new(),
        "[!] Key findings: Registrar exposed, No DNSSEC, Expires 2026".to_string(),
    ])
    .with_note(
        "WHOIS reveals ownership, registrar, nameservers and key dates from a public database, \
         with zero footprint on the target. No DNSSEC means the domain is open to DNS spoofing.",
        "ده زي الـ Linkedin بتاع الدومين.. معلومات عامة بس مفيدة جداً",
    )
}

fn nslookup(cmd: &Command) -> Response {
    let domain = domain(cmd);
    Response::lines([
        "Server:    8.8.8.8".to_string(),
        "Address:   8.8.8.8#53".to_string(),
        String::new(),
        "Non-authoritative answer:".to_string(),
        format!("Name:    {}", domain),
        "Address: 203.0.113.42".to_string(),
        format!("Name:    {}", domain),
        "Address: 203.0.113.43".to_string(),
        String::new(),
        format!("{}  mail exchanger = 10 mail.{}", domain, domain),
        String::new(),
        "[!] Two A records found: possible load balancer or CDN".to_string(),
        format!("[!] MX record reveals: mail.{}", domain),
    ])
    .with_note(
        "Two addresses usually mean load balancing or a CDN in front of the real server. The MX \
         record reveals the mail server, a separate attack surface.",
        "IP تانية يعني في CDN أو Load Balancer.. والـ MX بيديك target للـ phishing",
    )
}

fn dig(cmd: &Command) -> Response {
    let domain = domain(cmd);
    Response::lines([
        format!("; <<>> DiG 9.18.1 <<>> {}", domain),
        ";; ANSWER SECTION:".to_string(),
        format!("{}.    300  IN  A     203.0.113.42", domain),
        format!("{}.    300  IN  A     203.0.113.43", domain),
        String::new(),
        ";; ADDITIONAL DNS RECORDS:".to_string(),
        format!("{}.    300  IN  MX    10 mail.{}.", domain, domain),
        format!("{}.    300  IN  TXT   \"v=spf1 include:mailprovider.com ~all\"", domain),
        format!("{}.    300  IN  NS    ns1.evilcorp-dns.com.", domain),
        String::new(),
        "[!] SPF record found: mail provider exposed: mailprovider.com".to_string(),
    ])
    .with_note(
        "The TXT SPF record reveals which email provider the target uses.",
        "الـ TXT record بيكشف mail provider.. معلومة ذهبية للـ phishing",
    )
}

fn ping(cmd: &Command) -> Response {
    let host = domain(cmd);
    Response::lines([
        format!("PING {} (203.0.113.42) 56(84) bytes of data.", host),
        "64 bytes from 203.0.113.42: icmp_seq=1 ttl=54 time=23.4 ms".to_string(),
        "64 bytes from 203.0.113.42: icmp_seq=2 ttl=54 time=24.1 ms".to_string(),
        "64 bytes from 203.0.113.42: icmp_seq=3 ttl=54 time=22.9 ms".to_string(),
        String::new(),
        format!("--- {} ping statistics ---", host),
        "3 packets transmitted, 3 received, 0% packet loss".to_string(),
        String::new(),
        "[!] TTL=54 -> Likely Linux/Unix server".to_string(),
    ])
    .with_note(
        "TTL fingerprinting: Linux starts at 64, Windows at 128. Many hardened servers block \
         ICMP, so silence doesn't mean the host is down.",
        "TTL=54 يعني Linux.. لو كان 128 كان Windows",
    )
}

fn traceroute(cmd: &Command) -> Response {
    let host = domain(cmd);
    Response::lines([
        format!("traceroute to {} (203.0.113.42), 30 hops max", host),
        " 1  gateway (192.168.1.1)        1.2 ms".to_string(),
        " 2  isp-hop1.example.net          8.4 ms".to_string(),
        " 3  cloudflare-edge1.net          18.2 ms".to_string(),
        " 4  * * *   (filtered)".to_string(),
        " 5  203.0.113.42                 23.4 ms".to_string(),
        String::new(),
        "[!] Hop 3: CDN detected".to_string(),
        "[!] Hop 4: Firewall dropping ICMP".to_string(),
    ])
    .with_note_en("CDN hops mean the origin server IP is hidden behind the CDN.")
}

fn netstat(cmd: &Command) -> Response {
    let listening = cmd
        .flags
        .iter()
        .any(|f| f.contains('t') || f.contains('u') || f.contains('l'));
    if !listening {
        return Response::lines(["Try: netstat -tuln   (show listening TCP/UDP ports)"]);
    }
    Response::lines([
        "Active Internet connections (only servers)",
        "Proto  Local Address        State",
        "tcp    0.0.0.0:22           LISTEN   (SSH)",
        "tcp    0.0.0.0:80           LISTEN   (HTTP)",
        "tcp    0.0.0.0:443          LISTEN   (HTTPS)",
        "tcp    127.0.0.1:3306       LISTEN   (MySQL - localhost only)",
        "tcp    127.0.0.1:6379       LISTEN   (Redis - localhost only)",
        "",
        "[!] MySQL & Redis exposed on localhost: potential pivot point",
    ])
    .with_note(
        "Open ports reveal running services. MySQL and Redis bound to localhost are not \
         reachable from the internet, but once you have a shell they are your next target.",
        "MySQL وRedis على localhost يعني لو دخلت الجهاز هيبقى في targets تانية جاهزة",
    )
}

fn curl(cmd: &Command) -> Response {
    let host = cmd.target().unwrap_or(DEFAULT_DOMAIN);
    Response::lines([
        "HTTP/1.1 200 OK".to_string(),
        "Date: Wed, 19 Feb 2025 00:35:12 GMT".to_string(),
        "Server: Apache/2.4.41 (Ubuntu)".to_string(),
        "X-Powered-By: PHP/7.4.3".to_string(),
        "Content-Type: text/html; charset=UTF-8".to_string(),
        format!("Set-Cookie: PHPSESSID=8f3k2j9d; path=/; domain={}", host),
        String::new(),
        "[!] Server and X-Powered-By leak exact versions".to_string(),
        "[!] No X-Frame-Options or Content-Security-Policy headers".to_string(),
    ])
    .with_note(
        "Response headers fingerprint the stack without touching application logic. Exact \
         versions map straight to known CVEs.",
        "السيرفر بيقولك كل حاجة عن نفسه من غير ما تسأله كتير",
    )
}

/// Query rules for the simulated search engine. Always answers.
fn search_engine() -> RuleTable {
    RuleTable::new(vec![
        Rule::fixed(
            "admin-panel",
            contains("site:evilcorp.com").and(contains("inurl:admin")),
            Response::lines([
                "1 result (0.04 seconds)",
                "",
                "EvilCorp Admin Panel - Login",
                "  evilcorp.com/secret_panel",
                "  Admin Control Panel · Restricted Access · Powered by CustomCMS v2.1",
            ])
            .with_note_en("Precise dork. Target admin page located."),
        )
        .example("site:evilcorp.com inurl:admin"),
        Rule::fixed(
            "site-scoped",
            contains("site:evilcorp.com"),
            Response::lines([
                "3 results (0.21 seconds)",
                "",
                "EvilCorp - Home",
                "  evilcorp.com",
                "EvilCorp - About Us",
                "  evilcorp.com/about",
                "EvilCorp - Contact",
                "  evilcorp.com/contact",
            ])
            .with_note(
                "Good: you narrowed results to the target domain. Now add inurl: to find \
                 specific pages.",
                "كويس! ضيّقنا البحث للدومين.. بس فين الصفحة المهمة؟",
            ),
        )
        .example("site:evilcorp.com"),
        Rule::fixed(
            "too-broad",
            any(vec![
                contains("admin"),
                contains("login"),
                contains("panel"),
                contains("password"),
            ]),
            Response::lines(["About 4,230,000,000 results (0.78 seconds)"]).with_note(
                "Way too broad: billions of results. Dorks need operators to be useful. Try \
                 narrowing with site: first.",
                "يا عم ده زي ما تسأل \"فين المحل؟\" من غير ما تحدد أي مدينة",
            ),
        )
        .example("admin login"),
        Rule::fixed(
            "filetype",
            contains("filetype:"),
            Response::lines([
                "About 892,000 results (0.31 seconds)",
                "",
                "[PDF] EvilCorp Annual Report 2023",
                "  evilcorp.com/reports/annual2023.pdf",
                "[PDF] EvilCorp Employee Handbook",
                "  evilcorp.com/docs/handbook.pdf",
            ])
            .with_note(
                "filetype: is a valid dork operator! Combine with site: to narrow further.",
                "مش غلط يا صاحبي.. بس combine the operators",
            ),
        )
        .example("filetype:pdf evilcorp"),
        Rule::fixed(
            "generic",
            always(),
            Response::lines(["About 10,400,000,000 results (0.56 seconds)"]).with_note(
                "Too generic. Use site:, inurl:, filetype:, or intitle: operators.",
                "حاول تاني بـ operators يا كابتن",
            ),
        )
        .example("evilcorp"),
    ])
}
