//! Guest-facing reply texts

use crate::registry::Guest;
use crate::state_machine::state::Checkpoint;
use crate::transport::MediaKind;

pub const NOT_REGISTERED: &str = "Maaf, nomor anda belum terdaftar. Silahkan registrasi melalui undangan yang telah dikirimkan";

pub const TECHNICAL_ERROR: &str = "Terjadi kesalahan teknis pada sistem. Pesan dari nomor yang anda gunakan saat ini tidak bisa diproses oleh sistem. Silakan coba kembali menggunakan nomor lain";

pub const GENERIC_ERROR: &str =
    "Maaf, terjadi kesalahan pada sistem. Silakan coba kembali beberapa saat lagi";

pub const HELP: &str = "Pesan anda tidak dikenali

Anda dapat berinteraksi dengan akun WhatsApp ini dengan mengetikkan daftar pesan di bawah ini:

- Tekan *1* untuk *mengubah data jumlah konfirmasi kehadiran*
- Tekan *2* untuk *melihat data konfirmasi kehadiran anda*
- Tekan *3* untuk *mendapatkan kembali code QR anda*
- Tekan *23* untuk *mengirim foto atau video ucapan*

Terima kasih";

// Prompts
pub const PROMPT_HEADCOUNT: &str = "Anda akan mengubah jumlah kehadiran

Ketik jumlah kehadiran baru anda (cukup tuliskan dalam *angka*)";
pub const PROMPT_MEDIA: &str = "Silakan kirimkan foto atau video ucapan anda";
pub const PROMPT_QR: &str = "Silakan kirimkan QR code anda";

// Re-prompts
pub const REPROMPT_HEADCOUNT: &str = "Maaf, jumlah kehadiran baru anda tidak dapat diproses. Silakan ketik kembali jumlah kehadiran baru anda dalam *angka*. Ketik 0 jika anda ingin membatalkan";
pub const REPROMPT_MEDIA: &str =
    "Silakan kirimkan foto atau video ucapan anda. Tekan 0 jika anda ingin membatalkan";
pub const REPROMPT_QR: &str = "Mohon kirimkan code QR anda. Tekan 0 jika anda ingin membatalkan";

// Cancellations
pub const CANCELLED_HEADCOUNT: &str = "Pengubahan jumlah kehadiran dibatalkan";
pub const CANCELLED_MEDIA: &str = "Pengiriman ucapan dibatalkan";
pub const CANCELLED_QR: &str = "Pengiriman code QR dibatalkan";

pub const QR_INTRO: &str = "Berikut ini code QR anda";
pub const QR_CAPTION: &str = "Tunjukkan code QR saat hendak memasuki venue pada hari H.";
pub const QR_SEND_FAILED: &str =
    "Maaf terjadi kesalahan saat mengirimkan code QR. Silakan coba kembali";
pub const QR_INVALID: &str = "QR Code tidak valid";

pub const MEDIA_DOWNLOAD_FAILED: &str =
    "Maaf, file yang anda kirimkan tidak dapat diunduh. Silakan coba kirim kembali";
pub const MEDIA_STORE_FAILED: &str =
    "Maaf, ucapan anda gagal disimpan. Silakan coba kirim kembali";

pub const ROSTERS_LEFT: &str = "Anda sudah tidak terdaftar sebagai AT";
pub const PLAYLIST_RESET: &str = "Daftar video telah berhasil dihapus";
pub const BROADCAST_RECIPIENTS_FAILED: &str = "Broadcast error. Can't get WhatsApp Number List.";
pub const BROADCAST_STARTED: &str =
    "Broadcast reminder dimulai. Ringkasan akan dikirim setelah semua pesan terkirim";
pub const BROADCAST_IN_PROGRESS: &str = "Broadcast reminder masih berjalan";

pub fn rsvp_summary(guest: &Guest) -> String {
    format!(
        "Berikut ini rekap rencana kehadiran yang tercatat:\n\n*Nama*\t\t\t: {}\n*Jumlah Orang*\t: {}\n\n*Ketik angka 1 jika anda ingin mengubah jumlah kehadiran*",
        guest.name, guest.headcount
    )
}

pub fn rsvp_updated(name: &str, headcount: u32) -> String {
    format!(
        "Data konfirmasi kehadiran anda telah diperbarui\n\nBerikut ini rekap rencana kehadiran yang tercatat:\n\n*Nama*\t\t\t: {name}\n*Jumlah Orang*\t: {headcount}\n\nKetik angka 1 jika anda ingin kembali mengubah jumlah kehadiran"
    )
}

pub fn media_stored(kind: MediaKind) -> String {
    let noun = match kind {
        MediaKind::Image => "Foto",
        MediaKind::Video => "Video",
    };
    format!("Terima kasih. {noun} Ucapan anda telah berhasil disimpan")
}

pub fn welcome(name: &str) -> String {
    format!("Selamat datang, {name}")
}

pub fn roster_joined(checkpoint: Checkpoint, members: &[String]) -> String {
    format!(
        "Anda sudah terdaftar menjadi bagian dari {}, {}",
        checkpoint.label(),
        members.join(",")
    )
}

/// Notice sent to a checkpoint's operators after a successful scan
pub fn checkpoint_notice(guest: &Guest) -> String {
    format!(
        "Konfirmasi Kehadiran Berhasil!\n\n*Berikut data tamu undangan*\n\nNama: {}\nJumlah Konfirmasi (orang): {}\nVIP: {}\nVVIP: {}",
        guest.name,
        guest.headcount,
        guest.is_vip(),
        guest.is_vvip()
    )
}

pub fn broadcast_summary(delivered: usize, failed: usize) -> String {
    format!("Broadcast selesai. Terkirim: {delivered}, gagal: {failed}")
}
